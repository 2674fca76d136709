#![allow(dead_code)]

use std::sync::Arc;

use actix_web::web;
use anyhow::Result;
use chrono::{Datelike, Days, NaiveDate, Utc, Weekday};
use tempfile::TempDir;

use pto::AppState;
use pto::config::Config;
use pto::database::init_database;
use pto::database::models::{Entry, NewEntry, NewUser, User};
use pto::directory::DirectoryRecord;
use pto::directory::static_directory::{StaticDirectory, StaticPerson};
use pto::services::auth::hash_password;
use pto::services::forms::HoursForm;
use pto::services::hours::{field_name, save_entry_hours, weekday_dates};
use pto::services::notifier::OutboxMailer;

pub const PASSWORD: &str = "secret";

/// Build the app under test from a [`TestContext`].
#[allow(unused_macros)]
macro_rules! test_app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($ctx.state.clone())
                .app_data($ctx.config_data.clone())
                .configure(pto::routes::configure),
        )
        .await
    };
}

pub fn setup_test_env() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn person(
    given_name: &str,
    sn: &str,
    uid: &str,
    manager: Option<&str>,
    office: Option<&str>,
) -> StaticPerson {
    StaticPerson {
        record: DirectoryRecord {
            cn: format!("{} {}", given_name, sn),
            given_name: given_name.to_string(),
            sn: sn.to_string(),
            mail: format!("{}@mozilla.com", uid),
            uid: uid.to_string(),
        },
        password: Some(PASSWORD.to_string()),
        manager: manager.map(|m| format!("mail={},o=com,dc=mozilla", m)),
        office: office.map(str::to_string),
    }
}

/// Laura manages Peter and Bob; Peter works from London.
pub fn default_directory() -> StaticDirectory {
    StaticDirectory::empty()
        .with_person(person(
            "Laura",
            "Thomson",
            "laura",
            None,
            Some("Mountain View:::US"),
        ))
        .with_person(person(
            "Peter",
            "Bengtsson",
            "peter",
            Some("laura@mozilla.com"),
            Some("London:::GB"),
        ))
        .with_person(person(
            "Bob",
            "Builder",
            "bob",
            Some("laura@mozilla.com"),
            None,
        ))
}

// Test database wrapper
pub struct TestDb {
    pub pool: sqlx::SqlitePool,
    _temp_dir: TempDir,
}

impl TestDb {
    pub async fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let database_url = format!("sqlite:{}/test.db", temp_dir.path().display());
        let pool = init_database(&database_url).await?;

        Ok(TestDb {
            pool,
            _temp_dir: temp_dir,
        })
    }
}

pub struct TestContext {
    pub db: TestDb,
    pub config: Config,
    pub state: web::Data<AppState>,
    pub config_data: web::Data<Config>,
    pub outbox: OutboxMailer,
}

impl TestContext {
    pub async fn new() -> Result<Self> {
        Self::with_directory(default_directory()).await
    }

    pub async fn with_directory(directory: StaticDirectory) -> Result<Self> {
        let db = TestDb::new().await?;
        let config = Config::test_config();
        let outbox = OutboxMailer::new();

        let state = web::Data::new(AppState::new(
            db.pool.clone(),
            config.clone(),
            Arc::new(directory),
            Arc::new(outbox.clone()),
        ));

        Ok(TestContext {
            db,
            config_data: web::Data::new(config.clone()),
            config,
            state,
            outbox,
        })
    }

    /// A local account with [`PASSWORD`]; `manager` is an email.
    pub async fn user(
        &self,
        username: &str,
        first: &str,
        last: &str,
        manager: Option<&str>,
    ) -> User {
        let email = format!("{}@mozilla.com", username);
        let mut input = NewUser::new(username, &email).with_name(first, last);
        input.password_hash = Some(hash_password(PASSWORD).unwrap());
        let user = self.state.users.create_user(&input).await.unwrap();

        if let Some(manager) = manager {
            let mut profile = self.state.profiles.get_or_create(user.id).await.unwrap();
            profile.manager = manager.to_string();
            self.state.profiles.save(&profile).await.unwrap();
        }
        user
    }

    pub async fn staff(&self, username: &str) -> User {
        let user = self.user(username, "Staff", "Member", None).await;
        self.state
            .users
            .set_roles(user.id, true, false)
            .await
            .unwrap();
        self.state.users.find_by_id(user.id).await.unwrap().unwrap()
    }

    pub fn token(&self, user: &User) -> String {
        self.state.auth_service.generate_token(user, false).unwrap().0
    }

    pub fn bearer(&self, user: &User) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", self.token(user)))
    }

    /// A finished entry with `hours` on every weekday in the range.
    pub async fn logged_entry(
        &self,
        user: &User,
        start: NaiveDate,
        end: NaiveDate,
        details: &str,
        hours: i32,
    ) -> Entry {
        let entry = self
            .state
            .entries
            .create(&NewEntry {
                user_id: user.id,
                start_date: start,
                end_date: end,
                details: details.to_string(),
                total_hours: None,
            })
            .await
            .unwrap();

        let mut form = HoursForm::default();
        for day in weekday_dates(start, end) {
            form.fields.insert(field_name(day), hours.to_string());
        }
        save_entry_hours(&self.state.entries, &entry, &form, self.config.work_day)
            .await
            .unwrap()
            .entry
    }
}

/// A Monday at least a week away, so entries stay in the future.
pub fn future_monday() -> NaiveDate {
    let mut day = Utc::now().date_naive() + Days::new(8);
    while day.weekday() != Weekday::Mon {
        day = day + Days::new(1);
    }
    day
}

pub fn iso(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}
