//! Image folders → H.264 mp4, encoded by an `ffmpeg` child process fed with
//! raw rgb24 frames on stdin.

use anyhow::{Context, Result, bail};
use image::DynamicImage;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::image_decode;
use crate::manifest::{ImageManifest, MANIFEST_FILE};

pub const DEFAULT_FRAME_RATE: f64 = 12.0;
pub const VIDEO_FILE: &str = "video.mp4";
const TEMP_VIDEO_FILE: &str = "temp.mp4";

/// `BAG2MEDIA_FFMPEG` or `ffmpeg` from PATH.
pub fn ffmpeg_binary() -> String {
    std::env::var("BAG2MEDIA_FFMPEG").unwrap_or_else(|_| "ffmpeg".to_string())
}

pub struct VideoWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
    frames: u64,
    temp_path: PathBuf,
    output: PathBuf,
    finished: bool,
}

impl VideoWriter {
    pub fn ffmpeg_args(width: u32, height: u32, fps: f64, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-loglevel", "error", "-f", "rawvideo", "-pix_fmt", "rgb24"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.extend([
            "-s".to_string(),
            format!("{width}x{height}"),
            "-r".to_string(),
            format!("{fps}"),
            "-i".to_string(),
            "-".to_string(),
        ]);
        // libx264 with yuv420p needs even dimensions
        args.extend(
            ["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2", "-vcodec", "libx264", "-pix_fmt", "yuv420p"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(output.display().to_string());
        args
    }

    pub fn spawn(output: &Path, width: u32, height: u32, fps: f64) -> Result<Self> {
        Self::spawn_with(&ffmpeg_binary(), output, width, height, fps)
    }

    /// Encodes into a temporary file next to `output`, renamed on `finish`.
    pub fn spawn_with(binary: &str, output: &Path, width: u32, height: u32, fps: f64) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("invalid video size {width}x{height}");
        }
        if !(fps > 0.0) {
            bail!("frame rate must be > 0 (got {fps})");
        }
        let temp_path = output.with_file_name(TEMP_VIDEO_FILE);
        let mut child = Command::new(binary)
            .args(Self::ffmpeg_args(width, height, fps, &temp_path))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to start {binary}; is ffmpeg installed?"))?;
        let stdin = child.stdin.take();
        tracing::debug!(binary, %width, %height, fps, output = %output.display(), "ffmpeg started");
        Ok(Self {
            child,
            stdin,
            width,
            height,
            frames: 0,
            temp_path,
            output: output.to_path_buf(),
            finished: false,
        })
    }

    pub fn write_frame(&mut self, img: &DynamicImage) -> Result<()> {
        let rgb = if img.width() != self.width || img.height() != self.height {
            image_decode::resize(img, self.width, self.height).to_rgb8()
        } else {
            img.to_rgb8()
        };
        let stdin = self
            .stdin
            .as_mut()
            .context("video writer already closed")?;
        stdin
            .write_all(rgb.as_raw())
            .context("ffmpeg stopped accepting frames")?;
        self.frames += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<PathBuf> {
        drop(self.stdin.take());
        let status = self.child.wait().context("failed to wait for ffmpeg")?;
        if !status.success() {
            bail!("ffmpeg exited with {status} while writing {}", self.output.display());
        }
        fs::rename(&self.temp_path, &self.output)
            .with_context(|| format!("failed to move video to {}", self.output.display()))?;
        self.finished = true;
        tracing::info!(frames = self.frames, "video written to {}", self.output.display());
        Ok(self.output.clone())
    }
}

impl Drop for VideoWriter {
    // an unfinished encode leaves neither a running child nor a partial file
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        drop(self.stdin.take());
        let _ = self.child.kill();
        let _ = self.child.wait();
        if self.temp_path.exists() {
            let _ = fs::remove_file(&self.temp_path);
        }
        tracing::debug!(output = %self.output.display(), "unfinished video discarded");
    }
}

fn files_with_extension(folder: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(folder).with_context(|| format!("failed to read {}", folder.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext)) {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// Sorted `*.jpg` frames, or `*.png` when there are no jpgs.
pub fn list_frames(folder: &Path) -> Result<Vec<PathBuf>> {
    let jpgs = files_with_extension(folder, "jpg")?;
    if !jpgs.is_empty() {
        return Ok(jpgs);
    }
    files_with_extension(folder, "png")
}

/// Encode the frames of `input` into `output_dir/output_name`. `resize` is a
/// scale factor applied to every frame. Returns `None` when there are no frames.
pub fn create_video_from_images(
    input: &Path,
    output_dir: &Path,
    output_name: &str,
    frame_rate: f64,
    resize: Option<f64>,
) -> Result<Option<PathBuf>> {
    let frames = list_frames(input)?;
    let Some(first) = frames.first() else {
        tracing::warn!("No images found in {}", input.display());
        return Ok(None);
    };

    let load = |path: &Path| -> Result<DynamicImage> {
        let img = image::open(path).with_context(|| format!("failed to read {}", path.display()))?;
        Ok(match resize {
            Some(f) if f > 0.0 && f != 1.0 => image_decode::scale(&img, f),
            _ => img,
        })
    };

    let first_img = load(first)?;
    let mut writer = VideoWriter::spawn(
        &output_dir.join(output_name),
        first_img.width(),
        first_img.height(),
        frame_rate,
    )?;
    writer.write_frame(&first_img)?;
    for path in &frames[1..] {
        writer.write_frame(&load(path)?)?;
    }
    writer.finish().map(Some)
}

/// Build `video.mp4` inside an extracted topic folder at the frame rate stored
/// in its manifest. With `keep_images == false` the jpg frames are removed.
pub fn video_from_image_folder(folder: &Path, keep_images: bool, resize: Option<f64>) -> Result<Option<PathBuf>> {
    let frame_rate = if folder.join(MANIFEST_FILE).exists() {
        ImageManifest::read(folder)?.frame_rate()
    } else {
        None
    }
    .unwrap_or_else(|| {
        tracing::warn!("no frequency known for {}; using {} fps", folder.display(), DEFAULT_FRAME_RATE);
        DEFAULT_FRAME_RATE
    });

    let video = create_video_from_images(folder, folder, VIDEO_FILE, frame_rate, resize)?;

    if video.is_some() && !keep_images {
        for path in files_with_extension(folder, "jpg")? {
            fs::remove_file(&path).with_context(|| format!("failed to delete {}", path.display()))?;
        }
    }
    Ok(video)
}

#[derive(Debug, Clone)]
pub struct VideoOptions {
    /// Folder of extracted frames, usually holding an img_manifest.json
    pub folder: PathBuf,
    pub keep_images: bool,
    /// Scale factor applied to every frame
    pub resize: Option<f64>,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            folder: PathBuf::new(),
            keep_images: true,
            resize: None,
        }
    }
}

pub fn make_video(options: &VideoOptions) -> Result<Option<PathBuf>> {
    if !options.folder.is_dir() {
        bail!("{} is not a directory", options.folder.display());
    }
    if let Some(f) = options.resize
        && !(f > 0.0)
    {
        bail!("resize factor must be > 0 (got {f})");
    }
    video_from_image_folder(&options.folder, options.keep_images, options.resize)
}
