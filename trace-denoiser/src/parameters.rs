use anyhow::{Error, anyhow};
use denoise_common::{Channel, metrics::failures::FailureKind};
use serde::Deserialize;
use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
    str::FromStr,
};
use tv_denoise::Real;

#[derive(Debug, thiserror::Error)]
pub(crate) enum WeightsError {
    #[error("Cannot read weights from {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: Error },
    #[error("{0}")]
    Invalid(Error),
}

impl WeightsError {
    pub(crate) fn failure_kind(&self) -> FailureKind {
        match self {
            WeightsError::Read { .. } => FailureKind::FileReadFailed,
            WeightsError::Invalid(_) => FailureKind::InvalidParameter,
        }
    }
}

/// A `<channel>:<lambda>` pair given on the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ChannelLambda {
    pub(crate) channel: Channel,
    pub(crate) lambda: Real,
}

impl FromStr for ChannelLambda {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (channel, lambda) = s.split_once(':').ok_or_else(|| {
            anyhow!("Incorrect channel weight, expected pattern '<channel>:<lambda>', got '{s}'")
        })?;
        Ok(ChannelLambda {
            channel: Channel::from_str(channel.trim())?,
            lambda: validate_lambda(Real::from_str(lambda.trim())?)?,
        })
    }
}

/// Contents of the file passed with `--lambda-config`.
#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct LambdaConfig {
    #[serde(default)]
    pub(crate) default: Option<Real>,
    #[serde(default)]
    pub(crate) channels: HashMap<Channel, Real>,
}

impl LambdaConfig {
    pub(crate) fn load(path: &Path) -> Result<Self, Error> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    pub(crate) fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Reads the optional weights file at `path` and merges the command line
/// values over it.
pub(crate) fn load_lambda_table(
    path: Option<&Path>,
    cli_default: Option<Real>,
    cli_channels: &[ChannelLambda],
) -> Result<LambdaTable, WeightsError> {
    let config = match path {
        Some(path) => LambdaConfig::load(path).map_err(|reason| WeightsError::Read {
            path: path.to_owned(),
            reason,
        })?,
        None => LambdaConfig::default(),
    };
    LambdaTable::build(config, cli_default, cli_channels).map_err(WeightsError::Invalid)
}

/// Weight used for each channel once the file and command line are merged.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LambdaTable {
    default: Real,
    channels: HashMap<Channel, Real>,
}

impl LambdaTable {
    /// Command line values take precedence over those in `config`.
    /// A `cli_default` of `None` means `--lambda` was not given.
    pub(crate) fn build(
        config: LambdaConfig,
        cli_default: Option<Real>,
        cli_channels: &[ChannelLambda],
    ) -> Result<Self, Error> {
        let default = validate_lambda(cli_default.or(config.default).unwrap_or_default())?;
        let mut channels = HashMap::with_capacity(config.channels.len() + cli_channels.len());
        for (channel, lambda) in config.channels {
            channels.insert(channel, validate_lambda(lambda)?);
        }
        for &ChannelLambda { channel, lambda } in cli_channels {
            channels.insert(channel, validate_lambda(lambda)?);
        }
        Ok(Self { default, channels })
    }

    pub(crate) fn lambda(&self, channel: Channel) -> Real {
        self.channels.get(&channel).copied().unwrap_or(self.default)
    }
}

fn validate_lambda(lambda: Real) -> Result<Real, Error> {
    if lambda.is_finite() && lambda >= 0.0 {
        Ok(lambda)
    } else {
        Err(anyhow!(
            "Regularisation weight must be finite and non-negative, got {lambda}"
        ))
    }
}
