//! Flat-file outputs for downstream automation.
//!
//! Every run overwrites:
//! - `signal.txt`: `BUY` or `HOLD`
//! - `price.txt`: latest close, 2 decimals
//! - `stop_loss.txt` / `take_profit.txt`: 2 decimals, or `N/A` without levels
//! - `signal.env`: the four values above as `key=value` lines
//! - `summary.json`: run summary
//!
//! All files are staged as hidden temporaries in the output directory and
//! renamed into place only after every one of them was written. A failure
//! while staging removes the temporaries. A failure while renaming puts the
//! previous outputs back. Either way the directory keeps the last complete set.

use aramplus_core::signal::SignalDecision;
use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SIGNAL_FILE: &str = "signal.txt";
pub const PRICE_FILE: &str = "price.txt";
pub const STOP_LOSS_FILE: &str = "stop_loss.txt";
pub const TAKE_PROFIT_FILE: &str = "take_profit.txt";
pub const ENV_FILE: &str = "signal.env";
pub const SUMMARY_FILE: &str = "summary.json";

/// Written in place of a level when the decision carries none.
pub const NOT_APPLICABLE: &str = "N/A";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The four values every consumer reads, already formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalFiles {
    pub signal: String,
    pub price: String,
    pub stop_loss: String,
    pub take_profit: String,
}

impl SignalFiles {
    pub fn from_decision(decision: &SignalDecision) -> Self {
        Self {
            signal: decision.signal.as_str().to_string(),
            price: format_price(decision.close),
            stop_loss: format_level(decision.risk.map(|r| r.stop_loss)),
            take_profit: format_level(decision.risk.map(|r| r.take_profit)),
        }
    }

    /// `signal.env` contents.
    pub fn to_env(&self) -> String {
        format!(
            "signal={}\nprice={}\nstopLoss={}\ntakeProfit={}\n",
            self.signal, self.price, self.stop_loss, self.take_profit
        )
    }
}

pub fn format_price(price: f64) -> String {
    format!("{price:.2}")
}

pub fn format_level(level: Option<f64>) -> String {
    level.map_or_else(|| NOT_APPLICABLE.to_string(), format_price)
}

/// Write all output files for one run into `dir`.
///
/// Returns the final paths in write order.
pub fn write_outputs<S: Serialize>(
    dir: &Path,
    decision: &SignalDecision,
    summary: &S,
) -> Result<Vec<PathBuf>, OutputError> {
    let files = SignalFiles::from_decision(decision);
    let summary_json = serde_json::to_string_pretty(summary)?;

    let contents: [(&str, String); 6] = [
        (SIGNAL_FILE, files.signal.clone()),
        (PRICE_FILE, files.price.clone()),
        (STOP_LOSS_FILE, files.stop_loss.clone()),
        (TAKE_PROFIT_FILE, files.take_profit.clone()),
        (ENV_FILE, files.to_env()),
        (SUMMARY_FILE, summary_json),
    ];

    std::fs::create_dir_all(dir).map_err(|source| OutputError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut staged: Vec<Staged> = Vec::with_capacity(contents.len());
    for (name, text) in &contents {
        let entry = Staged {
            temp: dir.join(format!(".{name}.tmp")),
            target: dir.join(name),
            backup: dir.join(format!(".{name}.bak")),
        };
        if let Err(source) = std::fs::write(&entry.temp, text) {
            discard(&staged);
            let _ = std::fs::remove_file(&entry.temp);
            return Err(OutputError::Io {
                path: entry.temp,
                source,
            });
        }
        debug!("staged {}", entry.temp.display());
        staged.push(entry);
    }

    let written = commit(&staged)?;
    info!(
        "wrote {} = {} (price {}, SL {}, TP {}) to {}",
        SIGNAL_FILE,
        files.signal,
        files.price,
        files.stop_loss,
        files.take_profit,
        dir.display()
    );
    Ok(written)
}

/// One output file on its way into place.
struct Staged {
    temp: PathBuf,
    target: PathBuf,
    backup: PathBuf,
}

/// Rename every staged file over its target.
///
/// A previous target is moved aside first. If any step fails, the targets
/// already replaced get their previous contents back (or are removed when
/// there were none) and the remaining temporaries are deleted.
fn commit(staged: &[Staged]) -> Result<Vec<PathBuf>, OutputError> {
    let mut replaced: Vec<(&Staged, bool)> = Vec::with_capacity(staged.len());

    for (i, entry) in staged.iter().enumerate() {
        let had_previous = entry.target.exists();
        if let Err(source) = replace(entry, had_previous) {
            rollback(&replaced);
            discard(&staged[i..]);
            return Err(OutputError::Io {
                path: entry.target.clone(),
                source,
            });
        }
        replaced.push((entry, had_previous));
    }

    for (entry, had_previous) in &replaced {
        if *had_previous {
            let _ = std::fs::remove_file(&entry.backup);
        }
    }
    Ok(staged.iter().map(|e| e.target.clone()).collect())
}

fn replace(entry: &Staged, had_previous: bool) -> std::io::Result<()> {
    if had_previous {
        std::fs::rename(&entry.target, &entry.backup)?;
    }
    match std::fs::rename(&entry.temp, &entry.target) {
        Ok(()) => Ok(()),
        Err(e) => {
            if had_previous {
                let _ = std::fs::rename(&entry.backup, &entry.target);
            }
            Err(e)
        }
    }
}

fn rollback(replaced: &[(&Staged, bool)]) {
    for (entry, had_previous) in replaced.iter().rev() {
        let restored = if *had_previous {
            std::fs::rename(&entry.backup, &entry.target)
        } else {
            std::fs::remove_file(&entry.target)
        };
        if let Err(e) = restored {
            warn!("could not restore {}: {e}", entry.target.display());
        }
    }
}

fn discard(staged: &[Staged]) {
    for entry in staged {
        let _ = std::fs::remove_file(&entry.temp);
    }
}
