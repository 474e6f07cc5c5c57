use crate::encode::profile::{Container, EncodingProfile};
use crate::encode::recorder::{EncoderHost, Recorder, RecorderConfig, RecorderEvent, RecorderEvents};
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{WalkthroughError, WalkthroughResult};
use crate::render::frame::FrameRGBA;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

const STDOUT_CHUNK_BYTES: usize = 64 * 1024;

/// Options for [`FfmpegHost`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegOpts {
    /// `ffmpeg` executable, looked up on `PATH` when relative.
    pub program: PathBuf,
    /// Background color used to flatten alpha (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
}

impl Default for FfmpegOpts {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            bg_rgba: [0, 0, 0, 255],
        }
    }
}

/// Encoder host that spawns the system `ffmpeg` per recording.
///
/// Raw frames stream to `ffmpeg` stdin; the muxed container is read back from stdout in chunks.
pub struct FfmpegHost {
    opts: FfmpegOpts,
    capture: Option<bool>,
    encoders: Option<String>,
}

impl FfmpegHost {
    pub fn new(opts: FfmpegOpts) -> Self {
        Self {
            opts,
            capture: None,
            encoders: None,
        }
    }
}

#[async_trait]
impl EncoderHost for FfmpegHost {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    /// Runs `-version`, then `-encoders`, once per host.
    async fn supports_capture(&mut self) -> bool {
        if let Some(capture) = self.capture {
            return capture;
        }
        let program = &self.opts.program;
        let capture = program_output(program, &["-version"]).await.is_some();
        if capture {
            self.encoders = program_output(program, &["-hide_banner", "-encoders"]).await;
        } else {
            tracing::warn!(program = %program.display(), "ffmpeg not available");
        }
        self.capture = Some(capture);
        capture
    }

    /// Codec profiles need the listing gathered by [`EncoderHost::supports_capture`].
    fn is_type_supported(&mut self, profile: &EncodingProfile) -> bool {
        match profile.codec.as_deref() {
            None => true,
            Some(codec) => self
                .encoders
                .as_deref()
                .is_some_and(|listing| listing_has_encoder(listing, codec)),
        }
    }

    fn start(
        &mut self,
        cfg: RecorderConfig,
        events: RecorderEvents,
    ) -> WalkthroughResult<Box<dyn Recorder>> {
        let (width, height) = (cfg.canvas.width, cfg.canvas.height);
        if width == 0 || height == 0 {
            return Err(WalkthroughError::validation(
                "ffmpeg recorder width/height must be non-zero",
            ));
        }
        if !width.is_multiple_of(2) || !height.is_multiple_of(2) {
            return Err(WalkthroughError::validation(
                "ffmpeg recorder width/height must be even (required for yuv420p output)",
            ));
        }

        let mut cmd = Command::new(&self.opts.program);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Input: raw RGBA8 frames, flattened to opaque in push_frame.
        cmd.args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{width}x{height}"),
        ]);
        push_input_fps(&mut cmd, cfg.fps);
        cmd.args(["-i", "pipe:0", "-an"]);
        cmd.args(codec_args(&cfg.profile));
        cmd.args(["-pix_fmt", "yuv420p"]);
        if cfg.profile.container == Container::Mp4 {
            // Non-seekable output needs a fragmented mp4.
            cmd.args(["-movflags", "frag_keyframe+empty_moov"]);
        }
        cmd.args(["-f", cfg.profile.container.ffmpeg_format(), "pipe:1"]);

        let mut child = cmd.spawn().map_err(|e| {
            WalkthroughError::encoder_init(format!(
                "failed to spawn '{}': {e}",
                self.opts.program.display()
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| WalkthroughError::encoder_init("failed to open ffmpeg stdin"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| WalkthroughError::encoder_init("failed to open ffmpeg stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| WalkthroughError::encoder_init("failed to open ffmpeg stderr"))?;

        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });
        let stdout_pump = std::thread::spawn(move || {
            let pumped = pump_chunks(&mut stdout, &events);
            let _ = events.send(RecorderEvent::Stopped);
            pumped
        });

        tracing::debug!(
            mime = %cfg.profile.mime,
            width,
            height,
            "ffmpeg recorder started"
        );

        Ok(Box::new(FfmpegRecorder {
            child: Some(child),
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
            stdout_pump: Some(stdout_pump),
            scratch: vec![0u8; width as usize * height as usize * 4],
            cfg,
            bg_rgba: self.opts.bg_rgba,
            last_idx: None,
        }))
    }
}

struct FfmpegRecorder {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    stdout_pump: Option<JoinHandle<std::io::Result<()>>>,

    scratch: Vec<u8>,
    cfg: RecorderConfig,
    bg_rgba: [u8; 4],
    last_idx: Option<FrameIndex>,
}

impl Recorder for FfmpegRecorder {
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> WalkthroughResult<()> {
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(WalkthroughError::encode(
                "ffmpeg recorder received out-of-order frame index",
            ));
        }
        self.last_idx = Some(idx);

        if frame.width != self.cfg.canvas.width || frame.height != self.cfg.canvas.height {
            return Err(WalkthroughError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.canvas.width, self.cfg.canvas.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(WalkthroughError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        flatten_to_opaque_rgba8(
            &mut self.scratch,
            &frame.data,
            frame.premultiplied,
            self.bg_rgba,
        )?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(WalkthroughError::encode("ffmpeg recorder is already stopped"));
        };

        use std::io::Write as _;
        stdin.write_all(&self.scratch).map_err(|e| {
            WalkthroughError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    fn stop(&mut self) -> WalkthroughResult<()> {
        // Closing stdin ends the input stream; ffmpeg flushes and closes stdout.
        drop(self.stdin.take());
        Ok(())
    }

    fn finish(&mut self) -> WalkthroughResult<()> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| WalkthroughError::encode("ffmpeg recorder already finished"))?;

        let status = child.wait().map_err(|e| {
            WalkthroughError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        if let Some(handle) = self.stdout_pump.take() {
            handle
                .join()
                .map_err(|_| WalkthroughError::encode("ffmpeg stdout pump thread panicked"))?
                .map_err(|e| WalkthroughError::encode(format!("ffmpeg stdout read failed: {e}")))?;
        }
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| WalkthroughError::encode("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| WalkthroughError::encode(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(WalkthroughError::encode(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn pump_chunks(stdout: &mut impl Read, events: &RecorderEvents) -> std::io::Result<()> {
    let mut buf = vec![0u8; STDOUT_CHUNK_BYTES];
    loop {
        let n = match stdout.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if events.send(RecorderEvent::Data(buf[..n].to_vec())).is_err() {
            // Receiver gone; keep draining so ffmpeg never blocks on a full pipe.
            continue;
        }
    }
}

fn codec_args(profile: &EncodingProfile) -> Vec<String> {
    let Some(codec) = profile.codec.as_deref() else {
        return Vec::new();
    };
    let mut args = vec!["-c:v".to_owned(), codec.to_owned()];
    if codec.starts_with("libvpx") {
        args.extend(
            ["-deadline", "realtime", "-cpu-used", "8", "-b:v", "1M"]
                .into_iter()
                .map(str::to_owned),
        );
    }
    args
}

fn push_input_fps(cmd: &mut Command, fps: Fps) {
    // For rawvideo input, `-r` before `-i` sets the input framerate; rational as `num/den`.
    cmd.args(["-r", &format!("{}/{}", fps.num, fps.den)]);
}

fn listing_has_encoder(listing: &str, codec: &str) -> bool {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|name| name == codec)
}

fn flatten_to_opaque_rgba8(
    dst: &mut [u8],
    src: &[u8],
    premultiplied: bool,
    bg_rgba: [u8; 4],
) -> WalkthroughResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(WalkthroughError::validation(
            "flatten_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg = [
        u16::from(bg_rgba[0]),
        u16::from(bg_rgba[1]),
        u16::from(bg_rgba[2]),
    ];

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255u16 - a;
        for c in 0..3 {
            let fg = if premultiplied {
                u16::from(s[c])
            } else {
                mul_div255(u16::from(s[c]), a)
            };
            d[c] = (fg + mul_div255(bg[c], inv)).min(255) as u8;
        }
        d[3] = 255;
    }

    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u16 {
    let t = u32::from(x) * u32::from(y) + 128;
    ((t + (t >> 8)) >> 8) as u16
}

/// Stdout of `program args`, or `None` when it cannot run or exits unsuccessfully.
async fn program_output(program: &Path, args: &[&str]) -> Option<String> {
    let out = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .ok()?;
    out.status
        .success()
        .then(|| String::from_utf8_lossy(&out.stdout).into_owned())
}

/// Return `true` when `program -version` runs successfully.
pub fn is_program_available(program: &Path) -> bool {
    Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    is_program_available(Path::new("ffmpeg"))
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
