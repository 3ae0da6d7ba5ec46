use std::cell::Cell;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "tickoff-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "TICKOFF_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "TICKOFF_TIME_CONFIG";
const SYSTEM_TZ_ENV_VAR: &str = "TZ";

const LOCAL_DATETIME_FORMATS: [&str; 4] = [
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M:%S",
  "%Y-%m-%d %H:%M"
];

/// Source of wall-clock time for `created_at` stamps and date filters.
pub trait Clock {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct FixedClock {
  now: Cell<DateTime<Utc>>
}

impl FixedClock {
  pub fn new(
    now: DateTime<Utc>
  ) -> Self {
    Self {
      now: Cell::new(now)
    }
  }

  pub fn set(
    &self,
    now: DateTime<Utc>
  ) {
    self.now.set(now);
  }

  pub fn advance(
    &self,
    by: Duration
  ) {
    self.now.set(self.now.get() + by);
  }
}

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> {
    self.now.get()
  }
}

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Timezone whose calendar decides
/// what "today" means.
pub fn project_timezone() -> &'static Tz
{
  static PROJECT_TZ: OnceLock<Tz> =
    OnceLock::new();
  PROJECT_TZ.get_or_init(
    resolve_project_timezone
  )
}

#[must_use]
pub fn local_date(
  dt: DateTime<Utc>,
  tz: &Tz
) -> NaiveDate {
  dt.with_timezone(tz).date_naive()
}

#[must_use]
pub fn format_local_datetime(
  dt: DateTime<Utc>,
  tz: &Tz
) -> String {
  dt.with_timezone(tz)
    .format("%Y-%m-%d %H:%M")
    .to_string()
}

fn resolve_project_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  system_timezone(
    std::env::var(SYSTEM_TZ_ENV_VAR).ok()
  )
  .unwrap_or_else(|| {
    tracing::warn!(
      "could not determine the system \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

/// The machine's zone: an IANA name in
/// `TZ` wins, otherwise whatever the
/// OS reports.
fn system_timezone(
  tz_var: Option<String>
) -> Option<Tz> {
  if let Some(raw) = tz_var {
    let name = raw
      .trim()
      .trim_start_matches(':');
    if let Ok(tz) = name.parse::<Tz>() {
      return Some(tz);
    }
    tracing::debug!(
      tz = %raw,
      "TZ is not an IANA name; asking the OS"
    );
  }

  match iana_time_zone::get_timezone() {
    | Ok(name) => {
      parse_timezone(&name, "system")
    }
    | Err(err) => {
      tracing::debug!(
        error = %err,
        "system timezone lookup failed"
      );
      None
    }
  }
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured project timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

fn to_utc_from_local(
  local_naive: NaiveDateTime,
  tz: &Tz,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  match tz
    .from_local_datetime(&local_naive)
  {
    | LocalResult::Single(local_dt) => {
      Ok(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      let chosen = if first <= second {
        first
      } else {
        second
      };
      Ok(chosen.with_timezone(&Utc))
    }
    | LocalResult::None => {
      Err(anyhow!(
        "local datetime does not \
         exist in configured \
         timezone: {context}"
      ))
    }
  }
}

fn end_of_local_day(
  date: NaiveDate,
  tz: &Tz,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  let last_second = date
    .and_hms_opt(23, 59, 59)
    .ok_or_else(|| {
      anyhow!(
        "failed to construct end of \
         day for {date}"
      )
    })?;
  to_utc_from_local(
    last_second,
    tz,
    context
  )
}

/// Parses a deadline typed by the
/// user. Unparseable input means "no
/// deadline" rather than an error.
#[tracing::instrument(skip(now, tz), fields(input = input))]
pub fn parse_due_date(
  input: &str,
  now: DateTime<Utc>,
  tz: &Tz
) -> Option<DateTime<Utc>> {
  if input.trim().is_empty() {
    return None;
  }

  match parse_due_expr(input, now, tz) {
    | Ok(due) => Some(due),
    | Err(err) => {
      tracing::warn!(
        error = %err,
        "ignoring unparseable due date"
      );
      None
    }
  }
}

fn parse_due_expr(
  input: &str,
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let today = local_date(now, tz);

  match lower.as_str() {
    | "today" => {
      return end_of_local_day(
        today, tz, "today"
      );
    }
    | "tomorrow" => {
      let tomorrow = today
        .succ_opt()
        .ok_or_else(|| {
          anyhow!(
            "failed to advance to \
             next day"
          )
        })?;
      return end_of_local_day(
        tomorrow, tz, "tomorrow"
      );
    }
    | _ => {}
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  for format in LOCAL_DATETIME_FORMATS {
    if let Ok(naive) =
      NaiveDateTime::parse_from_str(
        token, format
      )
    {
      return to_utc_from_local(
        naive,
        tz,
        "local-datetime"
      );
    }
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return end_of_local_day(
      date, tz, "date-only"
    );
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {token}"
  ))
}


pub mod compact_date_serde {
  use chrono::{
    DateTime,
    NaiveDateTime,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  /// Written form. `%.f` prints as
  /// many fractional digits as needed,
  /// and none for whole seconds.
  const FORMAT: &str =
    "%Y%m%dT%H%M%S%.fZ";
  const WHOLE_SECONDS_FORMAT: &str =
    "%Y%m%dT%H%M%SZ";

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &dt.format(FORMAT).to_string()
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    parse(&raw)
      .map_err(serde::de::Error::custom)
  }

  fn parse(
    raw: &str
  ) -> Result<
    DateTime<Utc>,
    chrono::ParseError
  > {
    NaiveDateTime::parse_from_str(
      raw, FORMAT
    )
    .or_else(|_| {
      NaiveDateTime::parse_from_str(
        raw,
        WHOLE_SECONDS_FORMAT
      )
    })
    .map(|ndt| {
      DateTime::<Utc>::from_naive_utc_and_offset(
        ndt, Utc
      )
    })
  }

  pub mod option {
    use chrono::{
      DateTime,
      Utc
    };
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      dt: &Option<DateTime<Utc>>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match dt {
        | Some(value) => {
          super::serialize(
            value, serializer
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<DateTime<Utc>>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      Option::<String>::deserialize(
        deserializer
      )?
      .map(|raw| super::parse(&raw))
      .transpose()
      .map_err(serde::de::Error::custom)
    }
  }

  #[cfg(test)]
  mod tests {
    use chrono::{
      Duration,
      TimeZone,
      Utc
    };

    use super::parse;

    #[test]
    fn fractional_and_whole_second_stamps_both_read()
    {
      let base = Utc
        .with_ymd_and_hms(
          2026, 6, 10, 14, 0, 0
        )
        .single()
        .expect("valid instant");
      assert_eq!(
        parse("20260610T140000Z")
          .expect("whole seconds"),
        base
      );
      assert_eq!(
        parse("20260610T140000.123456789Z")
          .expect("nanoseconds"),
        base
          + Duration::nanoseconds(
            123_456_789
          )
      );
      assert!(parse("2026-06-10").is_err());
    }
  }
}
