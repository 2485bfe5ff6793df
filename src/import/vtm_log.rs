//! Parsing of VTM encoder console logs.
//!
//! The encoder prints one line per coded picture:
//!
//! ```text
//! POC    0 LId:  0 TId: 0 ( IDR_W_RADL, I-SLICE, QP 22 )     186240 bits [Y 44.5301 dB    U 46.0118 dB    V 47.2013 dB] [ET     1 ] [L0] [L1]
//! ```
//!
//! Each such line becomes a [`RunRecord`] with the POC as frame, the slice QP,
//! the coded bits as rate and the luma PSNR as distortion. Everything else in
//! the log (headers, summary tables) is ignored.
//!
//! The slice QP includes temporal-layer offsets; [`RunTable::from_vtm_logs`]
//! overwrites it with the QP the log was encoded at.
//!
//! [`RunTable::from_vtm_logs`]: crate::table::RunTable::from_vtm_logs

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::table::RunRecord;

/// Parse a single per-picture line. Returns `None` for any other line.
///
/// # Example
///
/// ```
/// use vvc_eval::import::vtm_log::parse_frame_line;
///
/// let line = "POC    8 LId:  0 TId: 1 ( CRA, B-SLICE, QP 28 )  5120 bits [Y 38.25 dB    U 40.1 dB    V 41.0 dB]";
/// let record = parse_frame_line(line).unwrap();
/// assert_eq!((record.frame, record.qp), (8, 28));
/// assert_eq!(record.rate, 5120.0);
/// assert_eq!(record.distortion, 38.25);
/// ```
#[must_use]
pub fn parse_frame_line(line: &str) -> Option<RunRecord> {
    let rest = line.trim_start().strip_prefix("POC")?;
    let frame = rest.split_whitespace().next()?.parse().ok()?;

    let open = rest.find('(')?;
    let close = open + rest[open..].find(')')?;

    // Older encoders print "nQP 22 QP 22"; the slice QP is the last one.
    let slice_info: Vec<&str> = rest[open + 1..close]
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();
    let qp = slice_info
        .windows(2)
        .filter(|w| w[0] == "QP")
        .filter_map(|w| w[1].parse().ok())
        .last()?;

    let after = &rest[close + 1..];
    let mut tokens = after.split_whitespace();
    let rate: f64 = tokens.next()?.parse().ok()?;
    if tokens.next()? != "bits" {
        return None;
    }

    let y_start = after.find("[Y")? + 2;
    let distortion = after[y_start..].split_whitespace().next()?.parse().ok()?;

    Some(RunRecord {
        frame,
        qp,
        rate,
        distortion,
    })
}

/// Parse every per-picture line of a log.
#[must_use]
pub fn parse_log(text: &str) -> Vec<RunRecord> {
    text.lines().filter_map(parse_frame_line).collect()
}

/// Read and parse a log file. A log without any picture lines is an error,
/// usually meaning the encoder run failed or was cut short.
pub fn parse_log_file(path: &Path) -> Result<Vec<RunRecord>> {
    let text = fs::read_to_string(path).map_err(|e| Error::VtmLog {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let records = parse_log(&text);
    if records.is_empty() {
        return Err(Error::VtmLog {
            path: path.to_path_buf(),
            reason: "no picture lines found".to_string(),
        });
    }
    log::debug!("{}: {} pictures", path.display(), records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
VVCSoftware: VTM Encoder Version 17.0 [Linux][GCC 11.4.0][64 bit] [SIMD=AVX2]
Input          File                    : BasketballPass_416x240_50.yuv

POC    0 LId:  0 TId: 0 ( IDR_W_RADL, I-SLICE, QP 22 )     186240 bits [Y 44.5301 dB    U 46.0118 dB    V 47.2013 dB] [ET     1 ] [L0] [L1]
POC    2 LId:  0 TId: 2 ( RASL_N, B-SLICE, QP 25 )      9408 bits [Y 41.0020 dB    U 44.9 dB    V 45.6 dB] [ET     0 ] [L0 0 ] [L1 4 ]

SUMMARY --------------------------------------------------------
\tTotal Frames |   Bitrate     Y-PSNR    U-PSNR    V-PSNR    YUV-PSNR
\t        2    a    4891.2000   42.7661   45.4559   46.4007   43.6152
";

    #[test]
    fn test_parse_log_skips_non_picture_lines() {
        let records = parse_log(LOG);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], RunRecord::new(0, 22, 186240.0, 44.5301));
        assert_eq!(records[1], RunRecord::new(2, 25, 9408.0, 41.0020));
    }

    #[test]
    fn test_old_style_nqp() {
        let line = "POC    4 TId: 0 ( B-SLICE, nQP 31 QP 32 )       2400 bits [Y 36.1 dB    U 39.0 dB    V 40.0 dB]";
        let record = parse_frame_line(line).unwrap();
        assert_eq!(record.qp, 32);
        assert_eq!(record.frame, 4);
    }

    #[test]
    fn test_rejects_malformed_line() {
        assert!(parse_frame_line("POC abc ( I-SLICE, QP 22 ) 10 bits [Y 1 dB]").is_none());
        assert!(parse_frame_line("POC 0 ( I-SLICE, QP 22 ) 10 bytes [Y 1 dB]").is_none());
        assert!(parse_frame_line("Total Frames").is_none());
    }

    #[test]
    fn test_empty_log_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("QP22.log");
        fs::write(&path, "encoder crashed\n").unwrap();
        assert!(matches!(parse_log_file(&path), Err(Error::VtmLog { .. })));
    }

    #[test]
    fn test_parse_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("QP22.log");
        fs::write(&path, LOG).unwrap();
        assert_eq!(parse_log_file(&path).unwrap().len(), 2);
    }
}
