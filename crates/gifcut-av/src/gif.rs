//! GIF encoding through ffmpeg.
//!
//! [`build_args`] turns [`ConversionParameters`] into an ffmpeg command line:
//!
//! ```text
//! ffmpeg -y -progress pipe:1 -nostats -i IN [-ss START] [-t DUR] -r FPS \
//!        -vf "fps=FPS,scale=W:-1:flags=lanczos[,FILTER][,reverse],split...paletteuse" \
//!        -loop 0 OUT.gif
//! ```
//!
//! The palette stage is where `quality` takes effect: 1 keeps a full
//! 256-colour palette, 31 shrinks it to 16 colours.

use std::path::Path;
use std::time::Duration;

use gifcut_common::{ConversionParameters, FilterKind, Result};

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// Progress snapshot parsed from one `-progress` block.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeProgress {
    /// Fraction complete, 0.0 to 1.0.
    pub pct: f64,
    /// Frames written so far.
    pub frame: Option<u64>,
    /// Encoding speed as reported by ffmpeg (e.g. `"2.5x"`).
    pub speed: Option<String>,
}

// ---------------------------------------------------------------------------
// Argument building
// ---------------------------------------------------------------------------

/// Palette size for a quality setting. Out-of-range values are clamped.
pub fn palette_colors(quality: u32) -> u32 {
    let q = quality.clamp(1, 31);
    256 - (q - 1) * 8
}

/// ffmpeg expression for a colour filter, `None` for [`FilterKind::None`].
pub fn filter_expr(filter: FilterKind) -> Option<&'static str> {
    match filter {
        FilterKind::None => None,
        FilterKind::Grayscale => Some("format=gray"),
        FilterKind::Sepia => {
            Some("colorchannelmixer=.393:.769:.189:0:.349:.686:.168:0:.272:.534:.131")
        }
        FilterKind::Blur => Some("boxblur=2:1"),
        FilterKind::Brightness => Some("eq=brightness=0.15"),
        FilterKind::Contrast => Some("eq=contrast=1.3"),
    }
}

/// The `-vf` filter graph for a set of parameters.
pub fn filter_chain(params: &ConversionParameters) -> String {
    let mut chain = format!(
        "fps={},scale={}:-1:flags=lanczos",
        params.frame_rate, params.width
    );

    if let Some(expr) = filter_expr(params.filter) {
        chain.push(',');
        chain.push_str(expr);
    }

    if params.reverse {
        chain.push_str(",reverse");
    }

    chain.push_str(&format!(
        ",split[s0][s1];[s0]palettegen=max_colors={}[p];[s1][p]paletteuse",
        palette_colors(params.quality)
    ));
    chain
}

/// Full ffmpeg argument list (without the program name).
pub fn build_args(input: &Path, output: &Path, params: &ConversionParameters) -> Vec<String> {
    let mut args: Vec<String> = ["-y", "-progress", "pipe:1", "-nostats", "-i"]
        .into_iter()
        .map(String::from)
        .collect();
    args.push(input.to_string_lossy().to_string());

    if params.start > 0.0 {
        args.push("-ss".into());
        args.push(params.start.to_string());
    }
    if params.duration > 0.0 {
        args.push("-t".into());
        args.push(params.duration.to_string());
    }

    args.push("-r".into());
    args.push(params.frame_rate.to_string());
    args.push("-vf".into());
    args.push(filter_chain(params));
    args.push("-loop".into());
    args.push("0".into());
    args.push(output.to_string_lossy().to_string());
    args
}

// ---------------------------------------------------------------------------
// Progress parsing
// ---------------------------------------------------------------------------

/// Accumulates `key=value` lines from `-progress` output and yields a
/// snapshot at the end of every block.
#[derive(Debug, Default)]
pub struct ProgressParser {
    expected_secs: Option<f64>,
    out_time_us: Option<i64>,
    frame: Option<u64>,
    speed: Option<String>,
}

impl ProgressParser {
    /// `expected_secs` is the output length; without it only the final
    /// block reports progress.
    pub fn new(expected_secs: Option<f64>) -> Self {
        Self {
            expected_secs: expected_secs.filter(|d| *d > 0.0),
            ..Default::default()
        }
    }

    /// Feed one line. Returns a snapshot when a `progress=` line closes a block.
    pub fn feed(&mut self, line: &str) -> Option<EncodeProgress> {
        let line = line.trim();
        if let Some(val) = line.strip_prefix("out_time_us=") {
            self.out_time_us = val.parse::<i64>().ok();
        } else if let Some(val) = line.strip_prefix("frame=") {
            self.frame = val.parse::<u64>().ok();
        } else if let Some(val) = line.strip_prefix("speed=") {
            if val != "N/A" {
                self.speed = Some(val.to_string());
            }
        } else if let Some(state) = line.strip_prefix("progress=") {
            let pct = if state == "end" {
                1.0
            } else {
                match (self.out_time_us, self.expected_secs) {
                    (Some(us), Some(expected)) => {
                        (us as f64 / 1_000_000.0 / expected).clamp(0.0, 1.0)
                    }
                    _ => return None,
                }
            };
            return Some(EncodeProgress {
                pct,
                frame: self.frame,
                speed: self.speed.clone(),
            });
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode `input` into an animated GIF at `output`.
///
/// `on_progress` receives a snapshot per ffmpeg progress block.
///
/// # Errors
///
/// Returns [`gifcut_common::Error::Tool`] if ffmpeg is missing, fails, or
/// exceeds `timeout`.
pub async fn encode_gif(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    params: &ConversionParameters,
    timeout: Duration,
    mut on_progress: impl FnMut(EncodeProgress),
) -> Result<()> {
    let ffmpeg = tools.require("ffmpeg")?;

    tracing::info!(
        "GIF encode: {:?} -> {:?} (start={}, duration={}, width={}, fps={}, quality={}, filter={}, reverse={})",
        input,
        output,
        params.start,
        params.duration,
        params.width,
        params.frame_rate,
        params.quality,
        params.filter,
        params.reverse,
    );

    let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
    cmd.timeout(timeout);
    cmd.args(build_args(input, output, params));
    tracing::trace!("ffmpeg args: {:?}", cmd.get_args());

    let mut parser = ProgressParser::new(Some(params.duration));
    cmd.execute_with_line_callback(|line| {
        if let Some(progress) = parser.feed(line) {
            on_progress(progress);
        }
    })
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn params() -> ConversionParameters {
        ConversionParameters::default()
    }

    #[test]
    fn palette_scales_with_quality() {
        assert_eq!(palette_colors(1), 256);
        assert_eq!(palette_colors(10), 184);
        assert_eq!(palette_colors(31), 16);
        assert_eq!(palette_colors(0), 256);
        assert_eq!(palette_colors(99), 16);
    }

    #[test]
    fn default_chain() {
        assert_eq!(
            filter_chain(&params()),
            "fps=10,scale=480:-1:flags=lanczos,split[s0][s1];[s0]palettegen=max_colors=184[p];[s1][p]paletteuse"
        );
    }

    #[test]
    fn filter_and_reverse_order() {
        let p = ConversionParameters {
            filter: FilterKind::Grayscale,
            reverse: true,
            ..params()
        };
        let chain = filter_chain(&p);
        assert!(chain.starts_with("fps=10,scale=480:-1:flags=lanczos,format=gray,reverse,split"));
    }

    #[test]
    fn every_filter_has_expression() {
        for kind in FilterKind::ALL {
            assert_eq!(filter_expr(kind).is_none(), kind == FilterKind::None);
        }
        assert_eq!(filter_expr(FilterKind::Blur), Some("boxblur=2:1"));
        assert_eq!(filter_expr(FilterKind::Contrast), Some("eq=contrast=1.3"));
    }

    #[test]
    fn args_include_trim() {
        let p = ConversionParameters {
            start: 2.5,
            duration: 3.0,
            ..params()
        };
        let args = build_args(Path::new("in.mp4"), Path::new("out.gif"), &p);
        let joined = args.join(" ");
        assert!(joined.starts_with("-y -progress pipe:1 -nostats -i in.mp4 -ss 2.5 -t 3 -r 10 -vf "));
        assert!(joined.ends_with("-loop 0 out.gif"));
    }

    #[test]
    fn args_omit_zero_trim() {
        let p = ConversionParameters {
            start: 0.0,
            duration: 0.0,
            ..params()
        };
        let args = build_args(&PathBuf::from("in.mp4"), &PathBuf::from("out.gif"), &p);
        assert!(!args.contains(&"-ss".to_string()));
        assert!(!args.contains(&"-t".to_string()));
    }

    #[test]
    fn parser_reports_fraction_per_block() {
        let mut parser = ProgressParser::new(Some(4.0));
        assert_eq!(parser.feed("frame=10"), None);
        assert_eq!(parser.feed("out_time_us=1000000"), None);
        assert_eq!(parser.feed("speed=2.0x"), None);
        let snap = parser.feed("progress=continue").unwrap();
        assert!((snap.pct - 0.25).abs() < 1e-9);
        assert_eq!(snap.frame, Some(10));
        assert_eq!(snap.speed.as_deref(), Some("2.0x"));

        parser.feed("out_time_us=9000000");
        assert_eq!(parser.feed("progress=continue").unwrap().pct, 1.0);
    }

    #[test]
    fn parser_without_duration_only_reports_end() {
        let mut parser = ProgressParser::new(Some(0.0));
        parser.feed("out_time_us=1000000");
        assert_eq!(parser.feed("progress=continue"), None);
        assert_eq!(parser.feed("progress=end").unwrap().pct, 1.0);
    }

    #[tokio::test]
    async fn encode_without_ffmpeg_fails() {
        let result = encode_gif(
            &ToolRegistry::default(),
            Path::new("in.mp4"),
            Path::new("out.gif"),
            &params(),
            Duration::from_secs(1),
            |_| {},
        )
        .await;
        assert!(result.is_err());
    }
}
