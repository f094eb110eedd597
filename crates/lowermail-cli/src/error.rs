use anyhow::Error;
use lowermail_config::ConfigError;
use lowermail_core::CoreError;
use lowermail_firestore::FirestoreError;
use lowermail_store::StoreError;
use std::process::ExitCode;
use thiserror::Error as ThisError;

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_INVALID_INPUT: u8 = 3;

#[derive(Debug, ThisError)]
pub enum CliError {
    #[error("{0} writes were rejected by the database")]
    FailedWrites(usize),
}

pub fn failed_writes(count: usize) -> Error {
    CliError::FailedWrites(count).into()
}

pub fn report_error(err: &Error, verbose: bool) {
    if verbose {
        eprintln!("error: {:#}", err);
    } else {
        eprintln!("error: {}", err);
    }
}

pub fn exit_code_for(err: &Error) -> ExitCode {
    for cause in err.chain() {
        if let Some(CliError::FailedWrites(_)) = cause.downcast_ref::<CliError>() {
            return ExitCode::from(EXIT_FAILURE);
        }
        if let Some(config_err) = cause.downcast_ref::<ConfigError>() {
            return ExitCode::from(config_exit_code(config_err));
        }
        if let Some(firestore_err) = cause.downcast_ref::<FirestoreError>() {
            return ExitCode::from(firestore_exit_code(firestore_err));
        }
        if let Some(store_err) = cause.downcast_ref::<StoreError>() {
            return ExitCode::from(store_exit_code(store_err));
        }
        if let Some(_core_err) = cause.downcast_ref::<CoreError>() {
            return ExitCode::from(EXIT_INVALID_INPUT);
        }
    }
    ExitCode::from(EXIT_FAILURE)
}

fn config_exit_code(err: &ConfigError) -> u8 {
    match err {
        ConfigError::MissingHomeDir => EXIT_FAILURE,
        ConfigError::InvalidConfigPath(_)
        | ConfigError::MissingConfigFile(_)
        | ConfigError::InsecurePermissions(_)
        | ConfigError::InvalidCollection(_)
        | ConfigError::InvalidPageSize(_)
        | ConfigError::InvalidFirestoreField { .. }
        | ConfigError::MissingCredential(_)
        | ConfigError::MissingEnvFile(_)
        | ConfigError::EnvFile { .. }
        | ConfigError::MissingCredentialsFile(_)
        | ConfigError::MissingCredentialField { .. }
        | ConfigError::UnsupportedCredentialType { .. }
        | ConfigError::ReadCredentials { .. }
        | ConfigError::ParseCredentials { .. }
        | ConfigError::Read { .. }
        | ConfigError::Parse { .. } => EXIT_INVALID_INPUT,
    }
}

fn firestore_exit_code(err: &FirestoreError) -> u8 {
    match err {
        FirestoreError::Jwt(_) | FirestoreError::Url(_) => EXIT_INVALID_INPUT,
        FirestoreError::Http(_)
        | FirestoreError::Json(_)
        | FirestoreError::Core(_)
        | FirestoreError::Auth(_)
        | FirestoreError::Api { .. }
        | FirestoreError::Decode(_) => EXIT_FAILURE,
    }
}

fn store_exit_code(err: &StoreError) -> u8 {
    match err {
        StoreError::InvalidPageSize(_) => EXIT_INVALID_INPUT,
        StoreError::Core(_)
        | StoreError::OutOfOrder { .. }
        | StoreError::Backend { .. }
        | StoreError::Unavailable(_) => EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::{exit_code_for, failed_writes};
    use anyhow::Context as _;
    use lowermail_config::ConfigError;
    use lowermail_store::StoreError;
    use std::process::ExitCode;

    #[test]
    fn rejected_writes_exit_with_failure() {
        let err = failed_writes(2);
        assert_eq!(exit_code_for(&err), ExitCode::from(1));
    }

    #[test]
    fn exit_code_follows_wrapped_cause() {
        let config: anyhow::Result<()> =
            Err(ConfigError::MissingCredential("GCLOUD_PROJECT_ID")).context("resolve credentials");
        assert_eq!(
            exit_code_for(&config.unwrap_err()),
            ExitCode::from(3)
        );

        let page: anyhow::Result<()> =
            Err(StoreError::InvalidPageSize(0)).context("migrate collection users");
        assert_eq!(exit_code_for(&page.unwrap_err()), ExitCode::from(3));

        let fetch: anyhow::Result<()> =
            Err(StoreError::Unavailable("timeout".to_string())).context("migrate collection users");
        assert_eq!(exit_code_for(&fetch.unwrap_err()), ExitCode::from(1));
    }
}
