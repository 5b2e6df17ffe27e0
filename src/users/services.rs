use lazy_static::lazy_static;
use regex::Regex;
use time::{macros::format_description, Date, OffsetDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    dto::UserPayload,
    repo::{StoreError, UserRepository},
    repo_types::{Role, User},
};
use crate::{
    auth::password::hash_password,
    error::AppError,
    validation::{ValidationErrors, Validator},
};

const EMAIL_TAKEN: &str = "Email already exists";
const NAME_MAX_CHARS: usize = 50;
const AGE_MIN: i64 = 18;
const AGE_MAX: i64 = 100;

lazy_static! {
    static ref PASSWORD_RE: Regex = Regex::new(r"^[0-9A-Za-z]+$").unwrap();
}

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Dates of birth travel as `DD-Mon-YYYY`, e.g. `15-Aug-1990`. The month
/// name is matched in any case on input.
pub fn parse_dob(raw: &str) -> Option<Date> {
    let format = format_description!("[day]-[month repr:short case_sensitive:false]-[year]");
    Date::parse(raw.trim(), format).ok()
}

pub fn format_dob(date: Date) -> Option<String> {
    date.format(format_description!("[day]-[month repr:short]-[year]")).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRule {
    Required,
    /// Absent means "keep the current one".
    Optional,
}

#[derive(Debug)]
pub struct ValidUser {
    pub name: String,
    pub role: Role,
    pub email: String,
    pub age: i32,
    pub password: Option<String>,
    pub dob: Option<Date>,
}

/// Runs every field rule plus the email uniqueness pre-check, collecting all
/// failures into one map.
pub async fn validate(
    repo: &dyn UserRepository,
    form: &UserPayload,
    password_rule: PasswordRule,
    except: Option<Uuid>,
) -> Result<ValidUser, AppError> {
    let mut v = Validator::new();

    let name = v
        .required("name", form.name.as_deref(), "Enter name")
        .filter(|n| {
            v.max_len(
                "name",
                n,
                NAME_MAX_CHARS,
                "Name should not be more than 50 characters",
            )
        })
        .map(str::to_string);

    let email = v
        .required("email", form.email.as_deref(), "Enter email")
        .map(normalize_email)
        .filter(|e| v.email("email", e, "Enter valid email"));
    if let Some(email) = &email {
        let taken = repo
            .email_taken(email, except)
            .await
            .map_err(|e| AppError::internal("Error in validating user", e))?;
        if taken {
            v.error("email", EMAIL_TAKEN);
        }
    }

    let role = v
        .required("role", form.role.as_deref(), "Enter role")
        .and_then(|r| match r.parse::<Role>() {
            Ok(role) => Some(role),
            Err(_) => {
                v.error("role", "Enter valid role");
                None
            }
        });

    let age = v
        .required_value("age", form.age, "Enter age")
        .filter(|&a| {
            v.min("age", a, AGE_MIN, "Age should be from 18")
                && v.max("age", a, AGE_MAX, "Age should not be greater than 100")
        })
        .and_then(|a| i32::try_from(a).ok());

    let password = match (password_rule, form.password.as_deref()) {
        (PasswordRule::Optional, None) => None,
        (_, raw) => v
            .required("password", raw, "Enter password")
            .and(raw)
            .filter(|p| {
                v.matches(
                    "password",
                    p,
                    &PASSWORD_RE,
                    "Password should be alphanumeric",
                )
            })
            .map(str::to_string),
    };

    let dob = match form.dob.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        None => None,
        Some(raw) => {
            let parsed = parse_dob(raw);
            if parsed.is_none() {
                v.error("dob", "Enter valid date of birth (DD-Mon-YYYY)");
            }
            parsed
        }
    };

    v.finish().map_err(|errors| {
        debug!(?errors, "user failed validation");
        AppError::Validation(errors)
    })?;

    match (name, role, email, age) {
        (Some(name), Some(role), Some(email), Some(age)) => Ok(ValidUser {
            name,
            role,
            email,
            age,
            password,
            dob,
        }),
        _ => Err(AppError::internal(
            "Error in validation",
            anyhow::anyhow!("validator accepted an incomplete form"),
        )),
    }
}

fn write_error(message: &'static str) -> impl FnOnce(StoreError) -> AppError {
    move |e| match e {
        StoreError::DuplicateEmail => {
            AppError::Validation(ValidationErrors::single("email", EMAIL_TAKEN))
        }
        other => AppError::internal(message, other),
    }
}

pub async fn create_user(
    repo: &dyn UserRepository,
    form: UserPayload,
) -> Result<User, AppError> {
    let valid = validate(repo, &form, PasswordRule::Required, None).await?;
    let Some(password) = valid.password else {
        return Err(AppError::Validation(ValidationErrors::single(
            "password",
            "Enter password",
        )));
    };
    let password_hash = hash_password(password)
        .await
        .map_err(|e| AppError::internal("Error in saving user", e))?;

    let now = OffsetDateTime::now_utc();
    let user = User {
        id: Uuid::new_v4(),
        name: valid.name,
        role: valid.role,
        email: valid.email,
        age: valid.age,
        password_hash,
        dob: valid.dob,
        date_created: now,
        last_updated: now,
        active_status: false,
    };

    repo.insert(&user)
        .await
        .map_err(write_error("Error in saving user"))?;
    info!(user_id = %user.id, "user created");
    Ok(user)
}

/// Overlays `patch` on `existing`, validates the result and stores it.
pub async fn update_user(
    repo: &dyn UserRepository,
    existing: User,
    patch: UserPayload,
) -> Result<User, AppError> {
    let form = UserPayload {
        name: patch.name.or_else(|| Some(existing.name.clone())),
        role: patch.role.or_else(|| Some(existing.role.to_string())),
        email: patch.email.or_else(|| Some(existing.email.clone())),
        age: patch.age.or(Some(i64::from(existing.age))),
        password: patch.password,
        dob: patch.dob.or_else(|| existing.dob.and_then(format_dob)),
    };
    let valid = validate(repo, &form, PasswordRule::Optional, Some(existing.id)).await?;

    let password_hash = match valid.password {
        Some(password) => hash_password(password)
            .await
            .map_err(|e| AppError::internal("Error in updating user", e))?,
        None => existing.password_hash,
    };

    let user = User {
        name: valid.name,
        role: valid.role,
        email: valid.email,
        age: valid.age,
        password_hash,
        dob: valid.dob,
        last_updated: OffsetDateTime::now_utc(),
        ..existing
    };

    let found = repo
        .update_profile(&user)
        .await
        .map_err(write_error("Error in updating user"))?;
    if !found {
        return Err(AppError::NotFound("User not found"));
    }
    info!(user_id = %user.id, "user updated");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::password::verify_password, users::memory::MemoryUserRepository};

    fn form(email: &str, age: i64, password: &str) -> UserPayload {
        UserPayload {
            name: Some("Jane Doe".into()),
            role: Some("Normal".into()),
            email: Some(email.into()),
            age: Some(age),
            password: Some(password.into()),
            dob: Some("15-Aug-1990".into()),
        }
    }

    fn validation_errors(err: AppError) -> ValidationErrors {
        match err {
            AppError::Validation(errors) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn dob_format_roundtrip() {
        let date = parse_dob("15-Aug-1990").unwrap();
        assert_eq!(format_dob(date).as_deref(), Some("15-Aug-1990"));
        assert!(parse_dob("1990-08-15").is_none());
        assert!(parse_dob("31-Feb-1990").is_none());
    }

    #[test]
    fn dob_month_is_case_insensitive() {
        let expected = parse_dob("15-Aug-1990");
        assert!(expected.is_some());
        for raw in ["15-aug-1990", "15-AUG-1990", " 15-aUg-1990 "] {
            assert_eq!(parse_dob(raw), expected, "{raw:?}");
        }
        assert_eq!(format_dob(expected.unwrap()).as_deref(), Some("15-Aug-1990"));
    }

    #[tokio::test]
    async fn age_bounds_are_inclusive() {
        let repo = MemoryUserRepository::new();
        for (i, age) in [18, 100].into_iter().enumerate() {
            let f = form(&format!("ok{i}@example.com"), age, "abc123");
            assert!(validate(&repo, &f, PasswordRule::Required, None).await.is_ok());
        }

        let f = form("a@example.com", 17, "abc123");
        let too_young = validate(&repo, &f, PasswordRule::Required, None)
            .await
            .unwrap_err();
        assert_eq!(
            validation_errors(too_young).get("age"),
            Some("Age should be from 18")
        );

        let f = form("a@example.com", 101, "abc123");
        let too_old = validate(&repo, &f, PasswordRule::Required, None)
            .await
            .unwrap_err();
        assert_eq!(
            validation_errors(too_old).get("age"),
            Some("Age should not be greater than 100")
        );
    }

    #[tokio::test]
    async fn password_must_be_alphanumeric() {
        let repo = MemoryUserRepository::new();
        for bad in ["abc 123", "abc-123", "pässword", "abc123!", " abc"] {
            let f = form("a@example.com", 30, bad);
            let err = validate(&repo, &f, PasswordRule::Required, None)
                .await
                .unwrap_err();
            assert_eq!(
                validation_errors(err).get("password"),
                Some("Password should be alphanumeric"),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn missing_fields_are_all_reported() {
        let repo = MemoryUserRepository::new();
        let err = validate(&repo, &UserPayload::default(), PasswordRule::Required, None)
            .await
            .unwrap_err();
        let errors = validation_errors(err);
        assert_eq!(errors.get("name"), Some("Enter name"));
        assert_eq!(errors.get("email"), Some("Enter email"));
        assert_eq!(errors.get("role"), Some("Enter role"));
        assert_eq!(errors.get("age"), Some("Enter age"));
        assert_eq!(errors.get("password"), Some("Enter password"));
        assert!(!errors.contains("dob"));
    }

    #[tokio::test]
    async fn rejects_unknown_role_long_name_and_bad_dob() {
        let repo = MemoryUserRepository::new();
        let mut f = form("a@example.com", 30, "abc123");
        f.role = Some("Root".into());
        f.name = Some("x".repeat(51));
        f.dob = Some("yesterday".into());
        let errors = validation_errors(
            validate(&repo, &f, PasswordRule::Required, None)
                .await
                .unwrap_err(),
        );
        assert_eq!(errors.get("role"), Some("Enter valid role"));
        assert_eq!(
            errors.get("name"),
            Some("Name should not be more than 50 characters")
        );
        assert_eq!(
            errors.get("dob"),
            Some("Enter valid date of birth (DD-Mon-YYYY)")
        );
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let repo = MemoryUserRepository::new();
        create_user(&repo, form("jane@example.com", 30, "abc123"))
            .await
            .unwrap();
        let err = create_user(&repo, form("  JANE@Example.COM ", 40, "xyz789"))
            .await
            .unwrap_err();
        assert_eq!(validation_errors(err).get("email"), Some(EMAIL_TAKEN));
    }

    #[tokio::test]
    async fn create_hashes_password_and_normalizes_email() {
        let repo = MemoryUserRepository::new();
        let user = create_user(&repo, form(" Jane@Example.com", 30, "abc123"))
            .await
            .unwrap();
        assert_eq!(user.email, "jane@example.com");
        assert!(!user.active_status);
        assert_ne!(user.password_hash, "abc123");
        assert!(verify_password("abc123".into(), user.password_hash.clone())
            .await
            .unwrap());
        assert_eq!(repo.find_by_id(user.id).await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn update_merges_and_keeps_password_when_absent() {
        let repo = MemoryUserRepository::new();
        let user = create_user(&repo, form("jane@example.com", 30, "abc123"))
            .await
            .unwrap();
        let patch = UserPayload {
            age: Some(31),
            ..UserPayload::default()
        };
        let updated = update_user(&repo, user.clone(), patch).await.unwrap();
        assert_eq!(updated.age, 31);
        assert_eq!(updated.name, user.name);
        assert_eq!(updated.email, user.email);
        assert_eq!(updated.dob, user.dob);
        assert_eq!(updated.password_hash, user.password_hash);
        assert_eq!(updated.date_created, user.date_created);
    }

    #[tokio::test]
    async fn update_may_keep_own_email_but_not_take_anothers() {
        let repo = MemoryUserRepository::new();
        let jane = create_user(&repo, form("jane@example.com", 30, "abc123"))
            .await
            .unwrap();
        create_user(&repo, form("john@example.com", 30, "abc123"))
            .await
            .unwrap();

        let same = UserPayload {
            email: Some("JANE@example.com".into()),
            ..UserPayload::default()
        };
        assert!(update_user(&repo, jane.clone(), same).await.is_ok());

        let clash = UserPayload {
            email: Some("john@example.com".into()),
            ..UserPayload::default()
        };
        let err = update_user(&repo, jane, clash).await.unwrap_err();
        assert_eq!(validation_errors(err).get("email"), Some(EMAIL_TAKEN));
    }

    #[tokio::test]
    async fn update_rehashes_new_password() {
        let repo = MemoryUserRepository::new();
        let user = create_user(&repo, form("jane@example.com", 30, "abc123"))
            .await
            .unwrap();
        let patch = UserPayload {
            password: Some("newpass42".into()),
            ..UserPayload::default()
        };
        let updated = update_user(&repo, user, patch).await.unwrap();
        assert!(verify_password("newpass42".into(), updated.password_hash)
            .await
            .unwrap());
    }
}
