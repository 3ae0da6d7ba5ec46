use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::view::ViewQuery;

const RC_ENV_VAR: &str = "TICKOFFRC";
const RC_FILE_NAME: &str = ".tickoffrc";

#[derive(Debug, Clone)]
pub struct Config {
  map:              HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  /// Built-in defaults only; no file
  /// is read.
  pub fn defaults() -> Self {
    let mut cfg = Config {
      map:          HashMap::new(),
      loaded_files: vec![]
    };

    for (key, value) in [
      ("data.location", "~/.tickoff"),
      ("confirm", "on"),
      ("color", "on"),
      ("view.status", "all"),
      ("view.due", "all"),
      ("view.sort", "date_desc")
    ] {
      cfg
        .map
        .insert(key.to_string(), value.to_string());
    }

    cfg
  }

  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::defaults();

    if let Some(path) =
      resolve_rc_path(rc_override)
    {
      info!(rc = %path.display(), "loading rc file");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no rc file found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      debug!(key = %k, value = %v, "applying override");
      self.map.insert(k, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  /// Default list selections from
  /// `view.status`, `view.due` and
  /// `view.sort`.
  pub fn view_query(
    &self
  ) -> anyhow::Result<ViewQuery> {
    let mut query = ViewQuery::default();
    if let Some(raw) =
      self.get("view.status")
    {
      query.status = raw
        .parse()
        .context("invalid view.status")?;
    }
    if let Some(raw) =
      self.get("view.due")
    {
      query.due = raw
        .parse()
        .context("invalid view.due")?;
    }
    if let Some(raw) =
      self.get("view.sort")
    {
      query.sort = raw
        .parse()
        .context("invalid view.sort")?;
    }
    Ok(query)
  }

  /// Reads one rc file. Includes are
  /// resolved against the including
  /// file's directory; a file already
  /// read is not read twice.
  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    if self.loaded_files.contains(&path)
    {
      warn!(rc = %path.display(), "rc file already loaded; skipping");
      return Ok(());
    }

    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_default();

    for (idx, raw_line) in
      text.lines().enumerate()
    {
      let at = || {
        format!(
          "{}:{}",
          path.display(),
          idx + 1
        )
      };

      match RcLine::parse(raw_line)
        .with_context(at)?
      {
        | RcLine::Blank => {}
        | RcLine::Include(target) => {
          let target = base_dir
            .join(expand_tilde(
              Path::new(target)
            ));
          if target.exists() {
            self.load_file(&target)?;
          } else {
            warn!(include = %target.display(), "include file does not exist; skipping");
          }
        }
        | RcLine::Setting(key, value) => {
          trace!(key, value, "loaded config key");
          self.map.insert(
            key.to_string(),
            value.to_string()
          );
        }
      }
    }

    Ok(())
  }
}

/// One meaningful rc line, comments
/// already removed.
#[derive(Debug, PartialEq, Eq)]
enum RcLine<'a> {
  Blank,
  Include(&'a str),
  Setting(&'a str, &'a str)
}

impl<'a> RcLine<'a> {
  fn parse(
    raw: &'a str
  ) -> anyhow::Result<Self> {
    let line = raw
      .split_once('#')
      .map_or(raw, |(before, _)| before)
      .trim();

    if line.is_empty() {
      return Ok(Self::Blank);
    }

    if let Some(rest) =
      line.strip_prefix("include ")
    {
      let target = rest.trim();
      if target.is_empty() {
        return Err(anyhow!(
          "include path cannot be empty"
        ));
      }
      return Ok(Self::Include(target));
    }

    let (key, value) = line
      .split_once('=')
      .ok_or_else(|| {
        anyhow!(
          "expected key = value, got: \
           {}",
          raw.trim()
        )
      })?;
    let key = key.trim();
    if key.is_empty() {
      return Err(anyhow!(
        "missing key before `=`"
      ));
    }
    Ok(Self::Setting(key, value.trim()))
  }
}

/// Picks the data directory (`--data`
/// wins over `data.location`) and
/// makes sure it exists.
#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = match override_dir {
    | Some(path) => path.to_path_buf(),
    | None => {
      let location = cfg
        .get("data.location")
        .ok_or_else(|| {
          anyhow!(
            "data.location is not set"
          )
        })?;
      expand_tilde(Path::new(&location))
    }
  };

  fs::create_dir_all(&dir)
    .with_context(|| {
      format!(
        "failed to create {}",
        dir.display()
      )
    })?;
  debug!(dir = %dir.display(), "data directory ready");

  Ok(dir)
}

fn resolve_rc_path(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(path.to_path_buf());
  }

  match std::env::var(RC_ENV_VAR) {
    | Ok(rc_env) if rc_env == "/dev/null" => None,
    | Ok(rc_env) => Some(PathBuf::from(rc_env)),
    | Err(_) => {
      let candidate =
        dirs::home_dir()?.join(RC_FILE_NAME);
      candidate
        .exists()
        .then_some(candidate)
    }
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  match (
    path.strip_prefix("~"),
    dirs::home_dir()
  ) {
    | (Ok(rest), Some(home)) => {
      home.join(rest)
    }
    | _ => path.to_path_buf()
  }
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::{
    Config,
    RcLine,
    resolve_data_dir
  };
  use crate::view::{
    DateFilter,
    SortKey,
    StatusFilter
  };

  #[test]
  fn rc_file_with_include_and_comments()
  {
    let temp = tempdir().expect("tempdir");
    let extra = temp.path().join("extra.rc");
    fs::write(
      &extra,
      "view.sort = priority\n"
    )
    .expect("write include");
    let rc = temp.path().join("main.rc");
    fs::write(
      &rc,
      "# defaults for the laptop\n\
       view.status = active  # hide done\n\
       confirm = off\n\
       include extra.rc\n\
       include missing.rc\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(rc.as_path()))
      .expect("load rc");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.get_bool("confirm"),
      Some(false)
    );

    let query =
      cfg.view_query().expect("query");
    assert_eq!(
      query.status,
      StatusFilter::Active
    );
    assert_eq!(query.due, DateFilter::All);
    assert_eq!(
      query.sort,
      SortKey::Priority
    );
  }

  #[test]
  fn malformed_line_names_file_and_line()
  {
    let temp = tempdir().expect("tempdir");
    let rc = temp.path().join("bad.rc");
    fs::write(&rc, "color = on\nwhat\n")
      .expect("write rc");

    let err = Config::load(Some(rc.as_path()))
      .expect_err("must fail");
    assert!(
      err.to_string().contains("bad.rc:2")
    );
  }

  #[test]
  fn rc_lines_are_classified() {
    assert_eq!(
      RcLine::parse("  # note")
        .expect("comment"),
      RcLine::Blank
    );
    assert_eq!(
      RcLine::parse("include ~/x.rc # more")
        .expect("include"),
      RcLine::Include("~/x.rc")
    );
    assert_eq!(
      RcLine::parse(" color = off ")
        .expect("setting"),
      RcLine::Setting("color", "off")
    );
    assert!(RcLine::parse("include ").is_err());
    assert!(RcLine::parse("= on").is_err());
  }

  #[test]
  fn include_cycles_are_read_once() {
    let temp = tempdir().expect("tempdir");
    let a = temp.path().join("a.rc");
    let b = temp.path().join("b.rc");
    fs::write(
      &a,
      "confirm = off\ninclude b.rc\n"
    )
    .expect("write a");
    fs::write(
      &b,
      "view.due = today\ninclude a.rc\n"
    )
    .expect("write b");

    let cfg = Config::load(Some(a.as_path()))
      .expect("load cyclic rc");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.get("view.due").as_deref(),
      Some("today")
    );
  }

  #[test]
  fn overrides_win_and_bad_view_keys_fail()
  {
    let mut cfg = Config::defaults();
    cfg.apply_overrides([(
      "view.due".to_string(),
      "soon".to_string()
    )]);
    let err = cfg
      .view_query()
      .expect_err("unknown date filter");
    assert!(
      format!("{err:#}")
        .contains("invalid view.due")
    );

    cfg.apply_overrides([(
      "view.due".to_string(),
      "overdue".to_string()
    )]);
    assert_eq!(
      cfg.view_query().expect("query").due,
      DateFilter::Overdue
    );
  }

  #[test]
  fn data_dir_override_is_created() {
    let temp = tempdir().expect("tempdir");
    let target =
      temp.path().join("nested/data");
    let dir = resolve_data_dir(
      &Config::defaults(),
      Some(target.as_path())
    )
    .expect("resolve");
    assert_eq!(dir, target);
    assert!(target.is_dir());
  }
}
