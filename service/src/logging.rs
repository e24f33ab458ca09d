use crate::config::{Config, RustEnv};
use log::LevelFilter;
use simplelog::{self, ColorChoice, ConfigBuilder, TerminalMode};

/// Dependency modules whose output is suppressed below Trace.
const FILTERED_MODULES: &[&str] = &["sqlx", "sea_orm", "tower", "tracing", "hyper", "h2", "axum"];

pub struct Logger {}

impl Logger {
    /// Initializes the global logger from the log level and runtime environment in `config`.
    ///
    /// Trace shows everything, including dependency output. Any other level hides the
    /// modules listed in `FILTERED_MODULES`. Production output is never colored so that
    /// log collectors receive plain text.
    pub fn init_logger(config: &Config) {
        let log_config = Self::build_log_config(Self::should_filter_dependencies(
            config.log_level_filter,
        ));

        simplelog::TermLogger::init(
            Self::convert_level_filter(config.log_level_filter),
            log_config,
            TerminalMode::Mixed,
            Self::color_choice(&config.runtime_env),
        )
        .expect("Failed to start simplelog");
    }

    fn convert_level_filter(level: LevelFilter) -> simplelog::LevelFilter {
        match level {
            LevelFilter::Off => simplelog::LevelFilter::Off,
            LevelFilter::Error => simplelog::LevelFilter::Error,
            LevelFilter::Warn => simplelog::LevelFilter::Warn,
            LevelFilter::Info => simplelog::LevelFilter::Info,
            LevelFilter::Debug => simplelog::LevelFilter::Debug,
            LevelFilter::Trace => simplelog::LevelFilter::Trace,
        }
    }

    fn should_filter_dependencies(level: LevelFilter) -> bool {
        level != LevelFilter::Trace
    }

    fn color_choice(runtime_env: &RustEnv) -> ColorChoice {
        match runtime_env {
            RustEnv::Production => ColorChoice::Never,
            RustEnv::Development | RustEnv::Staging => ColorChoice::Auto,
        }
    }

    fn build_log_config(apply_filters: bool) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();
        builder.set_target_level(LevelFilter::Error);

        if apply_filters {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noisy_dependencies_are_filtered() {
        for module in ["sqlx", "sea_orm", "hyper", "axum"] {
            assert!(
                FILTERED_MODULES.contains(&module),
                "{module} should be filtered"
            );
        }
    }

    #[test]
    fn trace_level_disables_dependency_filtering() {
        assert!(!Logger::should_filter_dependencies(LevelFilter::Trace));
        assert!(Logger::should_filter_dependencies(LevelFilter::Debug));
        assert!(Logger::should_filter_dependencies(LevelFilter::Info));
        assert!(Logger::should_filter_dependencies(LevelFilter::Off));
    }

    #[test]
    fn production_output_is_never_colored() {
        assert_eq!(
            Logger::color_choice(&RustEnv::Production) as u8,
            ColorChoice::Never as u8
        );
        assert_eq!(
            Logger::color_choice(&RustEnv::Development) as u8,
            ColorChoice::Auto as u8
        );
    }

    #[test]
    fn level_filters_convert_one_to_one() {
        assert_eq!(
            Logger::convert_level_filter(LevelFilter::Warn) as u8,
            simplelog::LevelFilter::Warn as u8
        );
        assert_eq!(
            Logger::convert_level_filter(LevelFilter::Trace) as u8,
            simplelog::LevelFilter::Trace as u8
        );
    }

    #[test]
    fn log_config_builds_with_and_without_filters() {
        let _filtered = Logger::build_log_config(true);
        let _unfiltered = Logger::build_log_config(false);
    }
}
