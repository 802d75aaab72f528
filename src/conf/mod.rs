//! Provides application configuration options.
//!
//! Configuration options can be parsed from config files in TOML format.

pub mod log;
pub mod media;

use std::env;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

#[doc(inline)]
pub use self::{log::Log, media::Media};

/// CLI argument that is responsible for holding application configuration
/// file path.
static APP_CONF_PATH_CMD_ARG_NAME: &str = "--conf";

/// Environment variable that is responsible for holding application
/// configuration file path.
static APP_CONF_PATH_ENV_VAR_NAME: &str = "MEDEA_MESH_CONF";

/// Prefix of environment variables overriding configuration values.
static APP_CONF_ENV_PREFIX: &str = "MEDEA_MESH";

/// Holds application config.
#[derive(Clone, Debug, Deserialize, Serialize, SmartDefault)]
#[serde(default)]
pub struct Conf {
    /// Logging settings.
    pub log: Log,

    /// Local media capture settings.
    pub media: Media,
}

impl Conf {
    /// Creates new [`Conf`] and applies values from such sources
    /// and in that order:
    /// - default values;
    /// - configuration file, the name of which is given as a command line
    ///   parameter or environment variable;
    /// - environment variables.
    ///
    /// # Errors
    ///
    /// Errors if parsing fails.
    pub fn parse() -> Result<Self, ConfigError> {
        let mut cfg = Config::new();

        if let Some(path) =
            get_conf_file_name(env::var(APP_CONF_PATH_ENV_VAR_NAME), env::args())
        {
            cfg.merge(File::with_name(&path))?;
        }

        cfg.merge(Environment::with_prefix(APP_CONF_ENV_PREFIX).separator("__"))?;

        cfg.try_into()
    }
}

/// Returns the path to the configuration file, if it's set via CLI `args`
/// or environment variable.
///
/// Environment variable takes precedence over the CLI argument.
fn get_conf_file_name<T>(
    env_var: Result<String, env::VarError>,
    cmd_args: T,
) -> Option<String>
where
    T: IntoIterator<Item = String>,
{
    if let Ok(path) = env_var {
        return Some(path);
    }
    let mut args = cmd_args
        .into_iter()
        .skip_while(|x| x != APP_CONF_PATH_CMD_ARG_NAME);
    args.next().and_then(|_| args.next())
}
