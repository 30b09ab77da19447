//! Accelerated strategy: delegate line matching to an external `ugrep`.
//!
//! ugrep is asked for an AND of case-insensitive fixed strings and prints
//! `path:line:text` records. Spans are recomputed in-process on every
//! returned line, which also drops any line the native matcher would
//! reject, so both strategies agree on the line set. Files whose content
//! turns out not to be clean UTF-8 past the sniffed prefix are matched
//! in-process instead.

use super::cancel::CancellationToken;
use super::native::{recheck_unclean, KeywordSet};
use super::types::LineHit;
use super::{FileResult, LineMatcher};
use crate::error::MatcherError;
use crate::query::Keyword;
use crate::scope::Candidate;
use ahash::AHashMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Files handed to one matcher process.
pub const BATCH_SIZE: usize = 64;

/// Pattern used for an empty query: any non-blank line.
const NON_BLANK_PATTERN: &str = r"^\s*\S";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

const STOP_NONE: u8 = 0;
const STOP_CANCELLED: u8 = 1;
const STOP_TIMED_OUT: u8 = 2;

#[derive(Debug, Clone)]
pub struct UgrepMatcher {
    program: PathBuf,
    timeout: Duration,
}

impl UgrepMatcher {
    /// Find the executable: `explicit` if given, else `ugrep` on `PATH`.
    pub fn locate(explicit: Option<&Path>, timeout: Duration) -> Result<Self, MatcherError> {
        let program = match explicit {
            Some(path) if path.is_file() => path.to_path_buf(),
            Some(_) => return Err(MatcherError::Unavailable),
            None => which::which("ugrep").map_err(|_| MatcherError::Unavailable)?,
        };
        Ok(Self { program, timeout })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, keywords: &[Keyword], paths: &[&Path]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-n", "-H", "--color=never", "-I", "-i", "-s"]);

        if keywords.is_empty() {
            cmd.arg("-e").arg(NON_BLANK_PATTERN);
        } else {
            cmd.arg("-F");
            for (idx, keyword) in keywords.iter().enumerate() {
                if idx > 0 {
                    cmd.arg("--and");
                }
                cmd.arg("-e").arg(&keyword.text);
            }
        }

        cmd.arg("--").args(paths);
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::null());
        cmd
    }

    fn run(
        &self,
        mut cmd: Command,
        index: &PathIndex,
        set: &KeywordSet,
        slots: &mut [Vec<LineHit>],
        token: &CancellationToken,
    ) -> Result<(), MatcherError> {
        let mut child = cmd.spawn().map_err(MatcherError::Spawn)?;
        let stdout = child.stdout.take().ok_or(MatcherError::Unavailable)?;
        let child = Mutex::new(child);
        let done = AtomicBool::new(false);
        let stop = AtomicU8::new(STOP_NONE);

        let parsed = std::thread::scope(|scope| {
            scope.spawn(|| watchdog(&child, &done, &stop, token, self.timeout));

            let mut reader = BufReader::new(stdout);
            let result = parse_stream(&mut reader, index, set, slots);
            done.store(true, Ordering::Release);
            result
        });

        let mut child = child.into_inner().unwrap_or_else(PoisonError::into_inner);
        if parsed.is_err() {
            let _ = child.kill();
        }
        let status = child.wait().map_err(MatcherError::Spawn)?;

        match stop.load(Ordering::Acquire) {
            STOP_CANCELLED => return Err(MatcherError::Cancelled),
            STOP_TIMED_OUT => return Err(MatcherError::TimedOut(self.timeout.as_secs())),
            _ => {}
        }
        parsed?;

        // 1 means "no lines selected"
        match status.code() {
            Some(0) | Some(1) => Ok(()),
            Some(code) => Err(MatcherError::ExitStatus(code)),
            None => Err(MatcherError::ExitStatus(-1)),
        }
    }
}

fn watchdog(
    child: &Mutex<Child>,
    done: &AtomicBool,
    stop: &AtomicU8,
    token: &CancellationToken,
    timeout: Duration,
) {
    let started = Instant::now();
    while !done.load(Ordering::Acquire) {
        let reason = if token.is_cancelled() {
            STOP_CANCELLED
        } else if started.elapsed() >= timeout {
            STOP_TIMED_OUT
        } else {
            std::thread::sleep(POLL_INTERVAL);
            continue;
        };

        stop.store(reason, Ordering::Release);
        let mut child = child.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = child.kill();
        return;
    }
}

/// Maps the exact path bytes passed to ugrep back to batch positions.
struct PathIndex {
    slots: AHashMap<Vec<u8>, usize>,
}

impl PathIndex {
    fn new(paths: &[&Path]) -> Self {
        let slots = paths
            .iter()
            .enumerate()
            .map(|(idx, path)| (path.to_string_lossy().into_owned().into_bytes(), idx))
            .collect();
        Self { slots }
    }

    /// Split a `path:line:text` record. The path may itself contain ':', so
    /// every ':' is tried until the prefix is a known path.
    fn split<'a>(&self, record: &'a [u8]) -> Option<(usize, usize, &'a [u8])> {
        for colon in memchr::memchr_iter(b':', record) {
            let Some(&slot) = self.slots.get(&record[..colon]) else {
                continue;
            };
            let rest = &record[colon + 1..];
            let digits_end = memchr::memchr(b':', rest)?;
            let line_number = std::str::from_utf8(&rest[..digits_end]).ok()?.parse().ok()?;
            return Some((slot, line_number, &rest[digits_end + 1..]));
        }
        None
    }
}

fn parse_stream(
    reader: &mut impl BufRead,
    index: &PathIndex,
    set: &KeywordSet,
    slots: &mut [Vec<LineHit>],
) -> Result<(), MatcherError> {
    let mut record = Vec::new();
    let mut scratch = Vec::new();

    loop {
        record.clear();
        let read = reader
            .read_until(b'\n', &mut record)
            .map_err(MatcherError::Spawn)?;
        if read == 0 {
            return Ok(());
        }

        let trimmed = record.strip_suffix(b"\n").unwrap_or(&record[..]);
        let trimmed = trimmed.strip_suffix(b"\r").unwrap_or(trimmed);

        let malformed = || MatcherError::Malformed(String::from_utf8_lossy(trimmed).into_owned());
        let (slot, line_number, text) = index.split(trimmed).ok_or_else(malformed)?;
        let text = std::str::from_utf8(text).map_err(|_| malformed())?;

        let Some(spans) = set.match_line(text, &mut scratch) else {
            continue;
        };
        slots[slot].push(LineHit {
            path: PathBuf::new(),
            line_number,
            text: text.to_string(),
            spans,
            view: None,
        });
    }
}

impl LineMatcher for UgrepMatcher {
    fn name(&self) -> &'static str {
        "ugrep"
    }

    fn search_batch(
        &self,
        candidates: &[&Candidate],
        set: &KeywordSet,
        keywords: &[Keyword],
        token: &CancellationToken,
    ) -> Result<Vec<FileResult>, MatcherError> {
        if token.is_cancelled() {
            return Err(MatcherError::Cancelled);
        }

        let paths: Vec<&Path> = candidates.iter().map(|c| c.path.as_path()).collect();
        let index = PathIndex::new(&paths);
        let mut slots: Vec<Vec<LineHit>> = vec![Vec::new(); candidates.len()];

        self.run(self.command(keywords, &paths), &index, set, &mut slots, token)?;

        let results = candidates
            .iter()
            .zip(slots)
            .map(|(candidate, mut hits)| {
                // ugrep drops files with a NUL or invalid UTF-8 past the
                // sniffed prefix, even mid-file
                if let Some(result) = recheck_unclean(candidate, set) {
                    debug!(path = %candidate.path.display(), "Content not clean UTF-8, matched in-process");
                    return result;
                }
                hits.sort_by_key(|h| h.line_number);
                hits.dedup_by_key(|h| h.line_number);
                for hit in &mut hits {
                    hit.path = candidate.path.clone();
                    hit.view = candidate.view;
                }
                Ok(hits)
            })
            .collect();

        debug!(files = candidates.len(), "ugrep batch finished");
        Ok(results)
    }
}
