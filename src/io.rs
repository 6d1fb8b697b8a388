// File-level helpers for transcoding, diffing and filtering.
//
// Wraps the in-memory/streaming APIs with buffered file I/O. Every failure
// to open or create a file carries the attempted path. Inputs ending in
// `.gz` are decompressed transparently (feature `gzip`), and written
// artifacts get a streaming SHA-256 (feature `file-io`).

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
#[cfg(feature = "file-io")]
use sha2::Digest;
use thiserror::Error;

use crate::image::{TranscodeError, TranscodeOptions, TranscodeStats, transcode};
use crate::trace::{
    DiffOptions, DiffReport, DiffSummary, FieldExtractor, FilterStats, LogDiffer, Scrubber,
    dedup, scrub,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file-level operations.
#[derive(Debug, Error)]
pub enum IoError {
    /// A file could not be opened or created.
    #[error("{}: {source}", .path.display())]
    Access {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Read or write failure on an already open file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("transcode error: {0}")]
    Transcode(#[from] TranscodeError),
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Size and checksum of a written artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputDigest {
    /// Bytes written.
    pub size: u64,
    /// SHA-256 of the bytes written (if `file-io` feature is enabled).
    pub sha256: Option<[u8; 32]>,
}

/// Statistics returned by `transcode_file()`.
#[derive(Debug, Clone)]
pub struct TranscodeFileStats {
    pub image: TranscodeStats,
    pub output: OutputDigest,
}

/// Statistics returned by `diff_files()`.
#[derive(Debug, Clone)]
pub struct DiffFileStats {
    pub summary: DiffSummary,
    pub output: OutputDigest,
}

/// Statistics returned by `dedup_file()` and `scrub_file()`.
#[derive(Debug, Clone)]
pub struct FilterFileStats {
    pub filter: FilterStats,
    pub output: OutputDigest,
}

/// Lowercase hex rendering of a digest.
pub fn hex_digest(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Opening files
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

fn access(path: &Path) -> impl FnOnce(io::Error) -> IoError + '_ {
    move |source| IoError::Access {
        path: path.to_path_buf(),
        source,
    }
}

/// Open `path` for buffered line reading.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead>, IoError> {
    let file = File::open(path).map_err(access(path))?;

    #[cfg(feature = "gzip")]
    {
        if path.extension().is_some_and(|ext| ext == "gz") {
            let decoder = flate2::read::MultiGzDecoder::new(file);
            return Ok(Box::new(BufReader::with_capacity(BUF_SIZE, decoder)));
        }
    }

    Ok(Box::new(BufReader::with_capacity(BUF_SIZE, file)))
}

/// Create (or truncate) `path` for buffered writing.
pub fn create_output(path: &Path) -> Result<BufWriter<File>, IoError> {
    let file = File::create(path).map_err(access(path))?;
    Ok(BufWriter::with_capacity(BUF_SIZE, file))
}

// ---------------------------------------------------------------------------
// Digest writer
// ---------------------------------------------------------------------------

/// Counts (and with `file-io`, hashes) everything written through it.
pub struct DigestWriter<W: Write> {
    inner: W,
    size: u64,
    #[cfg(feature = "file-io")]
    hasher: sha2::Sha256,
}

impl<W: Write> DigestWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            size: 0,
            #[cfg(feature = "file-io")]
            hasher: sha2::Sha256::new(),
        }
    }

    /// Flush the inner writer and return what went through.
    pub fn finish(mut self) -> io::Result<OutputDigest> {
        self.inner.flush()?;

        #[cfg(feature = "file-io")]
        let sha256 = Some(self.hasher.finalize().into());
        #[cfg(not(feature = "file-io"))]
        let sha256: Option<[u8; 32]> = None;

        Ok(OutputDigest {
            size: self.size,
            sha256,
        })
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.size += n as u64;
        #[cfg(feature = "file-io")]
        {
            self.hasher.update(&buf[..n]);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ---------------------------------------------------------------------------
// transcode_file
// ---------------------------------------------------------------------------

/// Transcode the sparse dump at `input_path` into a dense image at
/// `output_path`.
///
/// The output is written as it is produced; on a parse error the partial
/// image stays on disk.
pub fn transcode_file(
    input_path: &Path,
    output_path: &Path,
    opts: TranscodeOptions,
) -> Result<TranscodeFileStats, IoError> {
    let input = open_input(input_path)?;
    let mut writer = DigestWriter::new(create_output(output_path)?);

    let image = transcode(input, &mut writer, opts)?;
    let output = writer.finish()?;

    info!(
        "{} -> {}: {} word(s), {} fill",
        input_path.display(),
        output_path.display(),
        image.total_words(),
        image.fill_words
    );
    Ok(TranscodeFileStats { image, output })
}

// ---------------------------------------------------------------------------
// diff_files
// ---------------------------------------------------------------------------

/// Compare the logs at `path_a` and `path_b`, writing a report to the sink
/// returned by `make_output`.
///
/// `make_output` runs only once both logs are open, so a missing log
/// leaves an existing report file untouched.
pub fn diff_files<W, F>(
    path_a: &Path,
    path_b: &Path,
    make_output: F,
    opts: &DiffOptions,
) -> Result<DiffFileStats, IoError>
where
    W: Write,
    F: FnOnce() -> Result<W, IoError>,
{
    let a = open_input(path_a)?;
    let b = open_input(path_b)?;

    let mut report = DiffReport::new(DigestWriter::new(make_output()?), opts.format);
    report.write_header(&path_a.display().to_string(), &path_b.display().to_string())?;

    let mut differ = LogDiffer::new(a, b, opts.marker.as_str());
    for record in differ.by_ref() {
        report.write_record(&record?)?;
    }
    let summary = differ.summary().clone();
    let output = report.finish()?.finish()?;

    info!(
        "{} vs {}: {} difference(s) over {} line(s)",
        path_a.display(),
        path_b.display(),
        summary.records,
        summary.positions
    );
    Ok(DiffFileStats { summary, output })
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Drop consecutive duplicate records from the log at `input_path`.
pub fn dedup_file(
    input_path: &Path,
    output_path: &Path,
    extractor: &FieldExtractor,
) -> Result<FilterFileStats, IoError> {
    let input = open_input(input_path)?;
    let mut writer = DigestWriter::new(create_output(output_path)?);
    let filter = dedup(input, &mut writer, extractor)?;
    let output = writer.finish()?;
    Ok(FilterFileStats { filter, output })
}

/// Rewrite unknown values in the log at `input_path`.
pub fn scrub_file(
    input_path: &Path,
    output_path: &Path,
    scrubber: &Scrubber,
) -> Result<FilterFileStats, IoError> {
    let input = open_input(input_path)?;
    let mut writer = DigestWriter::new(create_output(output_path)?);
    let filter = scrub(input, &mut writer, scrubber)?;
    let output = writer.finish()?;
    Ok(FilterFileStats { filter, output })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::OutputMode;
    use crate::trace::ReportFormat;

    fn into_vec<'a>(out: &'a mut Vec<u8>) -> impl FnOnce() -> Result<&'a mut Vec<u8>, IoError> {
        move || Ok(out)
    }

    fn write_temp_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn transcode_file_writes_image() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_temp_file(dir.path(), "prog.hex", b"@00000001\n00000013\n");
        let output = dir.path().join("prog.coe");

        let stats = transcode_file(&input, &output, TranscodeOptions::default()).unwrap();
        assert_eq!(stats.image.fill_words, 1);
        assert_eq!(stats.image.data_words, 1);

        let written = std::fs::read(&output).unwrap();
        assert_eq!(stats.output.size, written.len() as u64);
        assert!(String::from_utf8(written).unwrap().ends_with("00000000,\n00000013;"));
    }

    #[test]
    fn missing_input_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.hex");
        let err = transcode_file(&missing, &dir.path().join("out.coe"), Default::default())
            .unwrap_err();
        match &err {
            IoError::Access { path, source } => {
                assert_eq!(path, &missing);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("nope.hex"));
    }

    #[test]
    fn parse_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_temp_file(dir.path(), "bad.hex", b"00000013\nxyz\n");
        let opts = TranscodeOptions {
            mode: OutputMode::Closed,
            ..Default::default()
        };
        let err = transcode_file(&input, &dir.path().join("out.coe"), opts).unwrap_err();
        assert!(matches!(err, IoError::Transcode(TranscodeError::Parse(_))));
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn diff_files_reports_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_temp_file(dir.path(), "a.log", b"reset\naddr=1\naddr=2\n");
        let b = write_temp_file(dir.path(), "b.log", b"reset\naddr=1\naddr=3\n");

        let mut out = Vec::new();
        let opts = DiffOptions::default();
        let stats = diff_files(&a, &b, into_vec(&mut out), &opts).unwrap();
        assert_eq!(stats.summary.records, 1);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("a.log") && lines[0].contains("b.log"));
        assert_eq!(lines[1], "Lines: 3: addr=2 || 3: addr=3");
    }

    #[test]
    fn diff_files_positional() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_temp_file(dir.path(), "a.log", b"x\nreset\n1\n");
        let b = write_temp_file(dir.path(), "b.log", b"reset\n2\n");

        let mut out = Vec::new();
        let opts = DiffOptions {
            format: ReportFormat::Positional,
            ..Default::default()
        };
        diff_files(&a, &b, into_vec(&mut out), &opts).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().nth(1), Some("InLines 2: 1 || 2"));
    }

    #[test]
    fn diff_files_opens_logs_before_output() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.log");
        let b = write_temp_file(dir.path(), "b.log", b"reset\n");

        let mut created = false;
        let err = diff_files(
            &missing,
            &b,
            || {
                created = true;
                Ok(Vec::new())
            },
            &DiffOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, IoError::Access { .. }));
        assert!(!created);
    }

    #[test]
    fn filters_round_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_temp_file(dir.path(), "bram.log", b"k1 a\nk1 b\nk2 0xxxxxxxxx\n");
        let light = dir.path().join("bramLight.log");
        let scrubbed = dir.path().join("bramLight1.log");

        let extractor = FieldExtractor::new(vec!["0:2".parse().unwrap()]);
        let stats = dedup_file(&input, &light, &extractor).unwrap();
        assert_eq!(stats.filter.lines_out, 2);

        let stats = scrub_file(&light, &scrubbed, &Scrubber::default()).unwrap();
        assert_eq!(stats.filter.lines_changed, 1);
        assert_eq!(
            std::fs::read_to_string(&scrubbed).unwrap(),
            "k1 a\nk2 0x00000000\n"
        );
    }

    #[cfg(feature = "file-io")]
    #[test]
    fn sha256_of_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_temp_file(dir.path(), "prog.hex", b"");
        let output = dir.path().join("prog.coe");
        let stats = transcode_file(&input, &output, TranscodeOptions::default()).unwrap();

        let expected: [u8; 32] = sha2::Sha256::digest(std::fs::read(&output).unwrap()).into();
        assert_eq!(stats.output.sha256, Some(expected));
        assert_eq!(hex_digest(&expected).len(), 64);
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn gzip_inputs_are_decompressed() {
        use flate2::Compression;
        use flate2::write::GzEncoder;

        let dir = tempfile::tempdir().unwrap();
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"reset\nsame\n").unwrap();
        let a = write_temp_file(dir.path(), "a.log.gz", &enc.finish().unwrap());
        let b = write_temp_file(dir.path(), "b.log", b"reset\nsame\n");

        let mut out = Vec::new();
        let stats = diff_files(&a, &b, into_vec(&mut out), &DiffOptions::default()).unwrap();
        assert_eq!(stats.summary.records, 0);
        assert_eq!(stats.summary.positions, 2);
    }
}
