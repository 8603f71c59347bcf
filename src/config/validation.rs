use crate::config::types::{FileConfig, MirrorOptions, MirrorSection};
use crate::url::validate_root_url;
use crate::ConfigError;

/// Upper bound on the worker pool size
pub const MAX_WORKERS: usize = 256;

/// Validates a parsed configuration file
pub fn validate_file(config: &FileConfig) -> Result<(), ConfigError> {
    validate_section(&config.mirror)
}

/// Validates the `[mirror]` table
fn validate_section(section: &MirrorSection) -> Result<(), ConfigError> {
    if let Some(root_url) = &section.root_url {
        validate_root_url(root_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid root-url '{}': {}", root_url, e)))?;
    }

    if let Some(workers) = section.workers {
        validate_workers(workers)?;
    }

    if let Some(timeout_secs) = section.timeout_secs {
        if timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout-secs must be >= 1".to_string(),
            ));
        }
    }

    if let Some(output_dir) = &section.output_dir {
        if output_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "output-dir cannot be empty".to_string(),
            ));
        }
    }

    if section.queue_capacity == Some(0) {
        return Err(ConfigError::Validation(
            "queue-capacity must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates fully assembled run options
///
/// The root URL is not checked here; the orchestrator rejects it with a
/// dedicated error before any work starts.
pub fn validate_options(options: &MirrorOptions) -> Result<(), ConfigError> {
    if options.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be at most {}, got {}",
            MAX_WORKERS, options.workers
        )));
    }

    if options.timeout.is_zero() {
        return Err(ConfigError::Validation(
            "timeout must be greater than zero".to_string(),
        ));
    }

    if options.output_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    if options.queue_capacity == 0 {
        return Err(ConfigError::Validation(
            "queue capacity must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_workers(workers: usize) -> Result<(), ConfigError> {
    if workers < 1 || workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, workers
        )));
    }
    Ok(())
}
