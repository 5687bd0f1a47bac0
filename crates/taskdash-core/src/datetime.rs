use anyhow::anyhow;
use chrono::{
  Local,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use tracing::debug;

use crate::config::Config;

/// Decides which calendar date counts
/// as "today" for due-date statistics.
#[derive(Debug, Clone, Copy)]
pub enum DayClock {
  Local,
  Zone(Tz)
}

impl DayClock {
  pub fn from_config(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let Some(raw) = cfg.get("timezone")
    else {
      return Ok(Self::Local);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty()
      || trimmed
        .eq_ignore_ascii_case("local")
    {
      return Ok(Self::Local);
    }

    let tz =
      parse_timezone(trimmed)?;
    debug!(timezone = %tz, "using configured timezone");
    Ok(Self::Zone(tz))
  }

  #[must_use]
  pub fn today(&self) -> NaiveDate {
    match self {
      | Self::Local => {
        Local::now().date_naive()
      }
      | Self::Zone(tz) => Utc::now()
        .with_timezone(tz)
        .date_naive()
    }
  }
}

fn parse_timezone(
  raw: &str
) -> anyhow::Result<Tz> {
  raw.parse::<Tz>().map_err(|err| {
    anyhow!(
      "invalid timezone '{raw}': {err}"
    )
  })
}
