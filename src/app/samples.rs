use crate::config::toml_config::{SampleKind, SamplesConfig};
use crate::core::directory::{DirectoryUserService, ListUsersRequest};
use crate::domain::model::{OrderBy, User, UserName, UserPhone};
use crate::utils::error::{DirectoryError, Result};
use reqwest::StatusCode;
use std::io::Write;

/// Runs the demo calls against a live service and prints what comes back.
pub struct SampleRunner<'a, W: Write> {
    service: &'a DirectoryUserService,
    config: &'a SamplesConfig,
    out: W,
}

impl<'a, W: Write> SampleRunner<'a, W> {
    pub fn new(service: &'a DirectoryUserService, config: &'a SamplesConfig, out: W) -> Self {
        Self {
            service,
            config,
            out,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Runs the enabled samples in order, stopping at the first failure.
    pub async fn run(&mut self) -> Result<()> {
        let enabled = self.config.enabled.clone();
        if enabled.is_empty() {
            tracing::warn!("No samples enabled, see [samples].enabled");
        }

        for kind in enabled {
            tracing::debug!("Running sample {:?}", kind);
            match kind {
                SampleKind::CreateUser => self.create_user_sample().await?,
                SampleKind::CreateUsers => self.create_users_sample().await?,
                SampleKind::GetUser => self.get_user_sample().await?,
                SampleKind::UpdateUser => self.update_user_sample().await?,
                SampleKind::DeleteUser => self.delete_user_sample().await?,
                SampleKind::ListUsers => self.list_users_sample().await?,
                SampleKind::QueryUsers => self.query_users_sample().await?,
            }
        }

        Ok(())
    }

    pub async fn create_user_sample(&mut self) -> Result<()> {
        let user = User::new(
            self.config.sample_email(),
            UserName::new(&self.config.given_name, &self.config.family_name),
            &self.config.password,
        )
        .with_change_password_at_next_login(true)
        .with_org_unit_path(&self.config.org_unit_path);

        let created = self.service.create_user(&user).await?;
        writeln!(self.out, "{}", created.to_pretty_string()?)?;
        Ok(())
    }

    pub async fn create_users_sample(&mut self) -> Result<()> {
        let users = self.batch_users();
        self.service.create_users(&users).await?;
        writeln!(self.out, "{} users created.", users.len())?;
        Ok(())
    }

    pub async fn get_user_sample(&mut self) -> Result<()> {
        match self.service.get_user(&self.config.lookup_user_key).await {
            Ok(user) => writeln!(self.out, "{}", user.to_pretty_string()?)?,
            Err(DirectoryError::ApiError { status, .. }) if status == StatusCode::NOT_FOUND => {
                writeln!(self.out, "User not found.")?
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    pub async fn update_user_sample(&mut self) -> Result<()> {
        writeln!(
            self.out,
            "********************** Update user with phone number **********************"
        )?;

        let phone = UserPhone::new(&self.config.work_phone, "work", true);
        let changes = User::default().with_phones(vec![phone]);

        let updated = self
            .service
            .update_user(&self.config.sample_email(), &changes)
            .await?;
        writeln!(self.out, "{}", updated.to_pretty_string()?)?;
        Ok(())
    }

    pub async fn delete_user_sample(&mut self) -> Result<()> {
        let email = self.config.sample_email();
        self.service.delete_user(&email).await?;
        writeln!(self.out, "User {} deleted.", email)?;
        Ok(())
    }

    pub async fn list_users_sample(&mut self) -> Result<()> {
        writeln!(
            self.out,
            "********************** List users by name **********************"
        )?;

        let users = self.service.list_users_by_name().await?;
        self.print_users(&users)
    }

    pub async fn query_users_sample(&mut self) -> Result<()> {
        let prefix = format!("{} {}", self.config.given_name, self.config.family_name);
        writeln!(
            self.out,
            "********************** Query users starting with {} **********************",
            prefix
        )?;

        let request = ListUsersRequest::new()
            .query(format!("givenName:'{}*'", prefix))
            .order_by(OrderBy::FamilyName);
        let users = self.service.list_users(&request).await?;
        self.print_users(&users)
    }

    /// `Jane Doe` / `Num0..NumN` users sharing the sample domain and org unit.
    pub fn batch_users(&self) -> Vec<User> {
        let given_name = format!("{} {}", self.config.given_name, self.config.family_name);
        let local_part = given_name.to_lowercase().replace(' ', ".");

        (0..self.config.batch_size)
            .map(|i| {
                let family_name = format!("Num{}", i);
                User::new(
                    format!(
                        "{}.{}@{}",
                        local_part,
                        family_name.to_lowercase(),
                        self.config.domain
                    ),
                    UserName::new(&given_name, family_name),
                    &self.config.password,
                )
                .with_change_password_at_next_login(true)
                .with_org_unit_path(&self.config.org_unit_path)
            })
            .collect()
    }

    fn print_users(&mut self, users: &[User]) -> Result<()> {
        if users.is_empty() {
            writeln!(self.out, "No users found.")?;
            return Ok(());
        }

        writeln!(self.out, "Users:")?;
        for user in users {
            writeln!(self.out, "{}", user.full_name().unwrap_or_default())?;
        }
        Ok(())
    }
}
