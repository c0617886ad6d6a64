//! Waveform loading and interpolation merge.
//!
//! The built-in reader understands the ASCII `SLIST` time-series layout:
//!
//! ```text
//! TIMESERIES XX_STA_00_HHZ_D, 6000 samples, 100 sps, 2024-01-01T00:00:00.000000, SLIST, FLOAT, Counts
//! 0.12 0.13 0.10 ...
//! ```
//!
//! A file may contain several such blocks (several channels, or several
//! segments of one channel). After parsing, segments that share a channel
//! identity are merged into one continuous trace:
//!
//! - gaps are filled by linear interpolation between the samples that border them
//! - overlaps keep the later segment's samples

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::{debug, warn};

use crate::domain::time::{format_iso, parse_iso, seconds_between};
use crate::domain::{Stream, Trace, TraceId};
use crate::error::{ReadError, WriteError};

const VALUES_PER_LINE: usize = 6;

/// Read a waveform file and merge it into one trace per channel identity.
pub fn load(path: &Path) -> Result<Stream, ReadError> {
    let text = fs::read_to_string(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let segments = parse_slist(path, &text)?;
    if segments.is_empty() {
        return Err(ReadError::Empty {
            path: path.to_path_buf(),
        });
    }

    let n_segments = segments.len();
    let stream = merge_interpolate(segments)?;
    debug!(
        file = %path.display(),
        segments = n_segments,
        traces = stream.len(),
        "loaded waveform"
    );
    Ok(stream)
}

/// Write a stream as `SLIST` blocks, one per trace.
pub fn write_slist(path: &Path, stream: &Stream) -> Result<(), WriteError> {
    let io_err = |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut out = std::io::BufWriter::new(fs::File::create(path).map_err(io_err)?);
    for tr in stream {
        writeln!(
            out,
            "TIMESERIES {}_{}_{}_{}_D, {} samples, {} sps, {}, SLIST, FLOAT, Counts",
            tr.id.network,
            tr.id.station,
            tr.id.location,
            tr.id.channel,
            tr.len(),
            tr.sampling_rate,
            format_iso(tr.starttime),
        )
        .map_err(io_err)?;

        for chunk in tr.data.chunks(VALUES_PER_LINE) {
            let line: Vec<String> = chunk.iter().map(|v| format!("{v}")).collect();
            writeln!(out, "{}", line.join(" ")).map_err(io_err)?;
        }
    }
    out.flush().map_err(io_err)?;
    Ok(())
}

struct Header {
    id: TraceId,
    n_samples: usize,
    sampling_rate: f64,
    starttime: chrono::DateTime<chrono::Utc>,
    line: usize,
}

fn parse_slist(path: &Path, text: &str) -> Result<Vec<Trace>, ReadError> {
    let parse_err = |line: usize, message: String| ReadError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut traces = Vec::new();
    let mut current: Option<(Header, Vec<f64>)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("TIMESERIES") {
            if let Some((header, data)) = current.take() {
                traces.push(finish_block(path, header, data)?);
            }
            let header = parse_header(rest, line_no).map_err(|m| parse_err(line_no, m))?;
            let data = Vec::with_capacity(header.n_samples);
            current = Some((header, data));
            continue;
        }

        let Some((header, data)) = current.as_mut() else {
            return Err(parse_err(line_no, "sample values before any TIMESERIES header".into()));
        };

        for token in line.split_whitespace() {
            let value: f64 = token
                .parse()
                .map_err(|_| parse_err(line_no, format!("invalid sample value '{token}'")))?;
            if data.len() == header.n_samples {
                return Err(parse_err(
                    line_no,
                    format!("more than the declared {} samples", header.n_samples),
                ));
            }
            data.push(value);
        }
    }

    if let Some((header, data)) = current.take() {
        traces.push(finish_block(path, header, data)?);
    }
    Ok(traces)
}

fn finish_block(path: &Path, header: Header, data: Vec<f64>) -> Result<Trace, ReadError> {
    if data.len() != header.n_samples {
        return Err(ReadError::Parse {
            path: path.to_path_buf(),
            line: header.line,
            message: format!(
                "header declares {} samples but {} were found",
                header.n_samples,
                data.len()
            ),
        });
    }
    Ok(Trace::new(header.id, header.starttime, header.sampling_rate, data))
}

fn parse_header(rest: &str, line: usize) -> Result<Header, String> {
    let fields: Vec<&str> = rest.split(',').map(str::trim).collect();
    if fields.len() < 6 {
        return Err(format!("expected at least 6 header fields, found {}", fields.len()));
    }

    let parts: Vec<&str> = fields[0].split('_').collect();
    if parts.len() < 4 {
        return Err(format!("invalid channel identity '{}'", fields[0]));
    }
    let id = TraceId::new(parts[0], parts[1], parts[2], parts[3]);

    let n_samples = leading_number(fields[1], "samples")?
        .parse::<usize>()
        .map_err(|_| format!("invalid sample count '{}'", fields[1]))?;

    let sampling_rate = leading_number(fields[2], "sps")?
        .parse::<f64>()
        .map_err(|_| format!("invalid sampling rate '{}'", fields[2]))?;
    if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
        return Err(format!("sampling rate must be positive, got {sampling_rate}"));
    }

    let starttime = parse_iso(fields[3]).ok_or_else(|| format!("invalid start time '{}'", fields[3]))?;

    if !fields[4].eq_ignore_ascii_case("SLIST") {
        return Err(format!("unsupported layout '{}' (only SLIST)", fields[4]));
    }

    Ok(Header {
        id,
        n_samples,
        sampling_rate,
        starttime,
        line,
    })
}

fn leading_number<'a>(field: &'a str, unit: &str) -> Result<&'a str, String> {
    let mut tokens = field.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(value), Some(u)) if u.eq_ignore_ascii_case(unit) => Ok(value),
        _ => Err(format!("expected '<number> {unit}', found '{field}'")),
    }
}

/// Merge segments sharing a channel identity into one continuous trace each.
///
/// Channel order follows first appearance in the input.
pub fn merge_interpolate(segments: Vec<Trace>) -> Result<Stream, ReadError> {
    let mut groups: Vec<(TraceId, Vec<Trace>)> = Vec::new();
    for tr in segments {
        match groups.iter_mut().find(|(id, _)| *id == tr.id) {
            Some((_, group)) => group.push(tr),
            None => groups.push((tr.id.clone(), vec![tr])),
        }
    }

    let mut merged = Vec::with_capacity(groups.len());
    for (id, mut group) in groups {
        group.sort_by_key(|tr| tr.starttime);
        let mut iter = group.into_iter();
        let Some(mut acc) = iter.next() else { continue };

        for next in iter {
            if !same_rate(acc.sampling_rate, next.sampling_rate) {
                return Err(ReadError::SamplingRateMismatch {
                    id: id.to_string(),
                    first: acc.sampling_rate,
                    second: next.sampling_rate,
                });
            }
            append_segment(&mut acc, next);
        }
        merged.push(acc);
    }

    Ok(Stream::new(merged))
}

fn same_rate(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs())
}

fn append_segment(acc: &mut Trace, next: Trace) {
    if next.data.is_empty() {
        return;
    }
    if acc.data.is_empty() {
        acc.starttime = next.starttime;
        acc.data = next.data;
        return;
    }

    // Position of `next`'s first sample on `acc`'s sample grid.
    let offset = seconds_between(acc.starttime, next.starttime) * acc.sampling_rate;
    let k = offset.round().max(0.0) as usize;
    let len = acc.data.len();

    if k > len {
        let missing = k - len;
        let last = acc.data[len - 1];
        let first = next.data[0];
        let step = (first - last) / (missing + 1) as f64;
        acc.data.extend((1..=missing).map(|j| last + step * j as f64));
        acc.data.extend(next.data);
        warn!(trace = %acc.id, samples = missing, "filled gap by interpolation");
    } else if k + next.data.len() <= len {
        // Fully covered: the later segment overwrites that stretch.
        acc.data[k..k + next.data.len()].copy_from_slice(&next.data);
    } else {
        if k < len {
            debug!(trace = %acc.id, samples = len - k, "resolved overlap");
        }
        acc.data.truncate(k);
        acc.data.extend(next.data);
    }
}
