// src/store/ticker_store.rs
use crate::error::StoreError;
use crate::symbols::{bucket_letter, TickerSymbol, ALPHABET};
use crate::types::PriceSnapshot;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const TICKERS_DIR: &str = "tickers";
pub const TICKER_DATA_DIR: &str = "ticker_data";

/// File-backed ticker index and per-ticker quote history.
///
/// Layout under the data directory:
/// - `tickers/<L>.json`: JSON array of validated symbols for letter `L`,
///   in discovery order.
/// - `tickers/<L>.cursor`: JSON string naming the furthest symbol ever
///   validated for `L`. Survives removal of that symbol from the bucket.
/// - `ticker_data/<SYMBOL>_data.jsonl`: one `PriceSnapshot` per line.
///
/// Bucket files are only ever replaced whole (temp file + rename), and each
/// letter has its own lock so read-modify-write cycles never interleave.
pub struct TickerStore {
    tickers_dir: PathBuf,
    ticker_data_dir: PathBuf,
    bucket_locks: [Mutex<()>; 26],
}

impl TickerStore {
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        let tickers_dir = data_dir.join(TICKERS_DIR);
        let ticker_data_dir = data_dir.join(TICKER_DATA_DIR);

        fs::create_dir_all(&tickers_dir)?;
        fs::create_dir_all(&ticker_data_dir)?;

        info!("📁 Ticker store opened at {}", data_dir.display());

        Ok(Self {
            tickers_dir,
            ticker_data_dir,
            bucket_locks: std::array::from_fn(|_| Mutex::new(())),
        })
    }

    pub fn bucket_path(&self, letter: char) -> PathBuf {
        self.tickers_dir.join(format!("{}.json", letter))
    }

    pub fn cursor_path(&self, letter: char) -> PathBuf {
        self.tickers_dir.join(format!("{}.cursor", letter))
    }

    pub fn series_path(&self, symbol: &TickerSymbol) -> PathBuf {
        self.ticker_data_dir.join(format!("{}_data.jsonl", symbol))
    }

    /// Validated symbols for `letter` in discovery order. A missing file is an
    /// empty bucket.
    pub fn load_bucket(&self, letter: char) -> Result<Vec<TickerSymbol>, StoreError> {
        let letter = bucket_letter(letter)?;
        self.read_bucket(letter)
    }

    /// Where the survey of `letter` resumes: the furthest symbol validated so
    /// far, even if monitoring has since dropped it from the bucket.
    pub fn survey_cursor(&self, letter: char) -> Result<Option<TickerSymbol>, StoreError> {
        let letter = bucket_letter(letter)?;
        let _guard = self.lock_bucket(letter);

        let marked = self.read_cursor(letter)?;
        let last = self.read_bucket(letter)?.pop();
        Ok(match (marked, last) {
            (Some(marked), Some(last)) if last.survey_rank() > marked.survey_rank() => Some(last),
            (Some(marked), _) => Some(marked),
            (None, last) => last,
        })
    }

    /// Every known symbol, bucket by bucket from A to Z.
    pub fn load_all(&self) -> Result<Vec<TickerSymbol>, StoreError> {
        let mut all = Vec::new();
        for letter in ALPHABET {
            all.extend(self.read_bucket(letter)?);
        }
        Ok(all)
    }

    pub fn bucket_sizes(&self) -> Result<Vec<(char, usize)>, StoreError> {
        let mut sizes = Vec::with_capacity(ALPHABET.len());
        for letter in ALPHABET {
            sizes.push((letter, self.read_bucket(letter)?.len()));
        }
        Ok(sizes)
    }

    /// Records a newly validated symbol at the end of its bucket.
    ///
    /// Fails with `DuplicateSymbol` when it is already present; callers that
    /// only care about presence can treat that as success.
    pub fn append_to_bucket(&self, symbol: &TickerSymbol) -> Result<(), StoreError> {
        let letter = symbol.letter();
        let _guard = self.lock_bucket(letter);

        let mut symbols = self.read_bucket(letter)?;
        if symbols.contains(symbol) {
            return Err(StoreError::DuplicateSymbol(symbol.to_string()));
        }
        symbols.push(symbol.clone());
        self.write_bucket(letter, &symbols)?;

        let advanced = match self.read_cursor(letter)? {
            Some(marked) => symbol.survey_rank() > marked.survey_rank(),
            None => true,
        };
        if advanced {
            self.write_atomic(&self.cursor_path(letter), &serde_json::to_vec(symbol)?)?;
        }

        debug!("Added {} to bucket {} ({} symbols)", symbol, letter, symbols.len());
        Ok(())
    }

    /// Drops a symbol from its bucket. Returns whether anything was removed.
    pub fn remove_from_bucket(&self, symbol: &TickerSymbol) -> Result<bool, StoreError> {
        let letter = symbol.letter();
        let _guard = self.lock_bucket(letter);

        let mut symbols = self.read_bucket(letter)?;
        let before = symbols.len();
        symbols.retain(|s| s != symbol);
        if symbols.len() == before {
            return Ok(false);
        }
        self.write_bucket(letter, &symbols)?;

        info!("🗑️ Removed {} from bucket {}", symbol, letter);
        Ok(true)
    }

    /// Appends one snapshot to the ticker's series, creating the file on first
    /// use. Existing history is never rewritten.
    pub fn append_snapshot(
        &self,
        symbol: &TickerSymbol,
        snapshot: &PriceSnapshot,
    ) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(snapshot)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(self.series_path(symbol))?;

        // A torn record from an interrupted append must not swallow this one.
        if ends_mid_line(&mut file)? {
            warn!("Series for {} ends in a partial record; starting a new line", symbol);
            line.insert(0, '\n');
        }
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Full stored history for a ticker, oldest first. A torn trailing line
    /// left by an interrupted append is skipped.
    pub fn load_series(&self, symbol: &TickerSymbol) -> Result<Vec<PriceSnapshot>, StoreError> {
        let path = self.series_path(symbol);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut series = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PriceSnapshot>(&line) {
                Ok(snapshot) => series.push(snapshot),
                Err(e) => warn!(
                    "Skipping unreadable record {} in {}: {}",
                    line_no + 1,
                    path.display(),
                    e
                ),
            }
        }
        Ok(series)
    }

    fn lock_bucket(&self, letter: char) -> parking_lot::MutexGuard<'_, ()> {
        self.bucket_locks[(letter as u8 - b'A') as usize].lock()
    }

    fn read_bucket(&self, letter: char) -> Result<Vec<TickerSymbol>, StoreError> {
        let path = self.bucket_path(letter);
        match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn read_cursor(&self, letter: char) -> Result<Option<TickerSymbol>, StoreError> {
        match fs::read_to_string(self.cursor_path(letter)) {
            Ok(content) if content.trim().is_empty() => Ok(None),
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_bucket(&self, letter: char, symbols: &[TickerSymbol]) -> Result<(), StoreError> {
        self.write_atomic(&self.bucket_path(letter), &serde_json::to_vec(symbols)?)
    }

    /// Replaces `path` whole: temp file, fsync, rename, then fsync of the
    /// directory so the rename itself is durable.
    fn write_atomic(&self, path: &Path, content: &[u8]) -> Result<(), StoreError> {
        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        let written = File::create(&temp_path).and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        });

        if let Err(e) = written.and_then(|_| fs::rename(&temp_path, path)) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        sync_dir(&self.tickers_dir)?;
        Ok(())
    }
}

/// True when the file is non-empty and its last byte is not a newline.
fn ends_mid_line(file: &mut File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
