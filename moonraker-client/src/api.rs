//! High-level printer operations on top of the JSON-RPC session
//!
//! [`MoonrakerApi`] wraps a [`MoonrakerClient`] and exposes typed file,
//! job, motion, temperature, and system operations. Motion and temperature
//! commands are expressed as G-code scripts sent through
//! `printer.gcode.script`, matching how Klipper expects them.
//!
//! Result decoding is tolerant: a successful response whose payload does
//! not match the expected shape decodes to an empty/default value with a
//! warning instead of failing the call. Moonraker omits optional metadata
//! fields routinely and that must not look like an error to callers.

use crate::client::MoonrakerClient;
use moonraker_core::{MoonrakerError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

/// One entry from a file listing, directory or file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileInfo {
    pub filename: String,
    pub path: String,
    pub size: u64,
    /// Modification time, seconds since the epoch.
    pub modified: f64,
    pub permissions: String,
    pub is_dir: bool,
}

/// Slicer metadata Moonraker extracted from a G-code file. Every field is
/// optional on the wire; absent fields decode to their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileMetadata {
    pub filename: String,
    pub size: u64,
    pub modified: f64,
    pub slicer: String,
    pub slicer_version: String,
    pub print_start_time: Option<f64>,
    pub job_id: Option<serde_json::Value>,
    pub layer_count: u32,
    pub object_height: f64,
    /// Estimated print time in seconds.
    pub estimated_time: f64,
    /// Filament length in millimeters.
    pub filament_total: f64,
    pub filament_weight_total: f64,
    pub first_layer_bed_temp: f64,
    pub first_layer_extr_temp: f64,
    pub gcode_start_byte: u64,
    pub gcode_end_byte: u64,
    pub thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub size: u64,
    pub relative_path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDirEntry {
    dirname: String,
    modified: f64,
    permissions: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFileEntry {
    filename: String,
    path: String,
    size: u64,
    modified: f64,
    permissions: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFileList {
    dirs: Vec<RawDirEntry>,
    files: Vec<RawFileEntry>,
}

/// Typed printer operations over a shared client session.
#[derive(Clone)]
pub struct MoonrakerApi {
    client: MoonrakerClient,
}

impl MoonrakerApi {
    pub fn new(client: MoonrakerClient) -> Self {
        Self { client }
    }

    /// The underlying session, for raw requests and subscriptions.
    pub fn client(&self) -> &MoonrakerClient {
        &self.client
    }

    // File management

    /// List files under a root ("gcodes" for printable files). Directories
    /// come first, then files, both in server order.
    pub async fn list_files(
        &self,
        root: &str,
        path: Option<&str>,
        extended: bool,
    ) -> Result<Vec<FileInfo>> {
        let mut params = json!({ "root": root });
        if let Some(path) = path {
            if !path.is_empty() {
                params["path"] = json!(path);
            }
        }
        if extended {
            params["extended"] = json!(true);
        }

        tracing::debug!(root, "listing files");
        let result = self.client.request("server.files.list", Some(params)).await?;
        let raw: RawFileList = decode_or_default("server.files.list", result);

        let mut files = Vec::with_capacity(raw.dirs.len() + raw.files.len());
        for dir in raw.dirs {
            files.push(FileInfo {
                filename: dir.dirname,
                modified: dir.modified,
                permissions: dir.permissions,
                is_dir: true,
                ..FileInfo::default()
            });
        }
        for file in raw.files {
            files.push(FileInfo {
                filename: file.filename,
                path: file.path,
                size: file.size,
                modified: file.modified,
                permissions: file.permissions,
                is_dir: false,
            });
        }
        tracing::debug!(count = files.len(), "file list received");
        Ok(files)
    }

    pub async fn file_metadata(&self, filename: &str) -> Result<FileMetadata> {
        ensure_filename("server.files.metadata", filename)?;
        let result = self
            .client
            .request("server.files.metadata", Some(json!({ "filename": filename })))
            .await?;
        Ok(decode_or_default("server.files.metadata", result))
    }

    pub async fn delete_file(&self, filename: &str) -> Result<()> {
        ensure_filename("server.files.delete_file", filename)?;
        tracing::info!(filename, "deleting file");
        self.client
            .request("server.files.delete_file", Some(json!({ "path": filename })))
            .await?;
        Ok(())
    }

    pub async fn move_file(&self, source: &str, dest: &str) -> Result<()> {
        ensure_filename("server.files.move", source)?;
        ensure_filename("server.files.move", dest)?;
        tracing::info!(source, dest, "moving file");
        self.client
            .request(
                "server.files.move",
                Some(json!({ "source": source, "dest": dest })),
            )
            .await?;
        Ok(())
    }

    pub async fn copy_file(&self, source: &str, dest: &str) -> Result<()> {
        ensure_filename("server.files.copy", source)?;
        ensure_filename("server.files.copy", dest)?;
        tracing::info!(source, dest, "copying file");
        self.client
            .request(
                "server.files.copy",
                Some(json!({ "source": source, "dest": dest })),
            )
            .await?;
        Ok(())
    }

    pub async fn create_directory(&self, path: &str) -> Result<()> {
        ensure_filename("server.files.post_directory", path)?;
        tracing::info!(path, "creating directory");
        self.client
            .request("server.files.post_directory", Some(json!({ "path": path })))
            .await?;
        Ok(())
    }

    pub async fn delete_directory(&self, path: &str, force: bool) -> Result<()> {
        ensure_filename("server.files.delete_directory", path)?;
        tracing::info!(path, force, "deleting directory");
        self.client
            .request(
                "server.files.delete_directory",
                Some(json!({ "path": path, "force": force })),
            )
            .await?;
        Ok(())
    }

    // Job control

    pub async fn start_print(&self, filename: &str) -> Result<()> {
        ensure_filename("printer.print.start", filename)?;
        tracing::info!(filename, "starting print");
        self.client
            .request("printer.print.start", Some(json!({ "filename": filename })))
            .await?;
        Ok(())
    }

    pub async fn pause_print(&self) -> Result<()> {
        tracing::info!("pausing print");
        self.client.request("printer.print.pause", None).await?;
        Ok(())
    }

    pub async fn resume_print(&self) -> Result<()> {
        tracing::info!("resuming print");
        self.client.request("printer.print.resume", None).await?;
        Ok(())
    }

    pub async fn cancel_print(&self) -> Result<()> {
        tracing::info!("canceling print");
        self.client.request("printer.print.cancel", None).await?;
        Ok(())
    }

    // Motion control

    /// Home the given axes ("xy", "z", ...); an empty string homes all.
    pub async fn home_axes(&self, axes: &str) -> Result<()> {
        for axis in axes.chars() {
            ensure_axis("printer.gcode.script", axis)?;
        }
        let gcode = home_gcode(axes);
        tracing::info!(axes = if axes.is_empty() { "all" } else { axes }, %gcode, "homing");
        self.run_gcode(&gcode).await
    }

    /// Move one axis by a relative distance in millimeters. `feedrate` is
    /// in mm/min; `None` uses the printer's current feedrate.
    pub async fn move_axis(&self, axis: char, distance: f64, feedrate: Option<f64>) -> Result<()> {
        ensure_axis("printer.gcode.script", axis)?;
        ensure_feedrate("printer.gcode.script", feedrate)?;
        let gcode = relative_move_gcode(axis, distance, feedrate);
        tracing::info!(%axis, distance, "moving axis");
        self.run_gcode(&gcode).await
    }

    /// Move one axis to an absolute position in millimeters.
    pub async fn move_to_position(
        &self,
        axis: char,
        position: f64,
        feedrate: Option<f64>,
    ) -> Result<()> {
        ensure_axis("printer.gcode.script", axis)?;
        ensure_feedrate("printer.gcode.script", feedrate)?;
        let gcode = absolute_move_gcode(axis, position, feedrate);
        tracing::info!(%axis, position, "moving axis to position");
        self.run_gcode(&gcode).await
    }

    // Temperature control

    /// Set a heater target in degrees Celsius ("extruder", "heater_bed").
    pub async fn set_temperature(&self, heater: &str, temperature: f64) -> Result<()> {
        ensure_filename("printer.gcode.script", heater)?;
        if temperature < 0.0 {
            return Err(MoonrakerError::validation(
                "printer.gcode.script",
                "temperature must not be negative",
            ));
        }
        tracing::info!(heater, temperature, "setting temperature");
        self.run_gcode(&format!(
            "SET_HEATER_TEMPERATURE HEATER={heater} TARGET={temperature}"
        ))
        .await
    }

    /// Set a fan speed as a percentage. The part cooling fan ("fan") takes
    /// M106; named fans take SET_FAN_SPEED.
    pub async fn set_fan_speed(&self, fan: &str, speed: f64) -> Result<()> {
        ensure_filename("printer.gcode.script", fan)?;
        if !(0.0..=100.0).contains(&speed) {
            return Err(MoonrakerError::validation(
                "printer.gcode.script",
                "fan speed must be between 0 and 100 percent",
            ));
        }
        tracing::info!(fan, speed, "setting fan speed");
        self.run_gcode(&fan_gcode(fan, speed)).await
    }

    // System control

    /// Run a raw G-code script.
    pub async fn run_gcode(&self, script: &str) -> Result<()> {
        tracing::debug!(%script, "executing G-code");
        self.client
            .request("printer.gcode.script", Some(json!({ "script": script })))
            .await?;
        Ok(())
    }

    pub async fn emergency_stop(&self) -> Result<()> {
        tracing::warn!("emergency stop");
        self.client.request("printer.emergency_stop", None).await?;
        Ok(())
    }

    pub async fn restart_firmware(&self) -> Result<()> {
        tracing::info!("restarting firmware");
        self.client.request("printer.firmware_restart", None).await?;
        Ok(())
    }

    pub async fn restart_klipper(&self) -> Result<()> {
        tracing::info!("restarting Klipper");
        self.client.request("printer.restart", None).await?;
        Ok(())
    }

    // Queries

    /// Whether Klipper reports the "ready" state.
    pub async fn printer_ready(&self) -> Result<bool> {
        let result = self.client.request("printer.info", None).await?;
        Ok(result.get("state").and_then(|s| s.as_str()) == Some("ready"))
    }

    /// Current print state from `print_stats` ("standby", "printing",
    /// "paused", "complete", "error", "cancelled"), or "unknown" when the
    /// object is not reported.
    pub async fn print_state(&self) -> Result<String> {
        let params = json!({ "objects": { "print_stats": null } });
        let result = self
            .client
            .request("printer.objects.query", Some(params))
            .await?;
        let state = result
            .pointer("/status/print_stats/state")
            .and_then(|s| s.as_str())
            .unwrap_or("unknown");
        Ok(state.to_string())
    }
}

fn decode_or_default<T: DeserializeOwned + Default>(method: &str, value: serde_json::Value) -> T {
    match serde_json::from_value(value) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(method, error = %e, "unexpected result shape, using default");
            T::default()
        }
    }
}

fn ensure_filename(method: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MoonrakerError::validation(method, "name must not be empty"));
    }
    Ok(())
}

fn ensure_axis(method: &str, axis: char) -> Result<()> {
    if matches!(axis.to_ascii_uppercase(), 'X' | 'Y' | 'Z' | 'E') {
        Ok(())
    } else {
        Err(MoonrakerError::validation(
            method,
            format!("invalid axis '{axis}'"),
        ))
    }
}

fn ensure_feedrate(method: &str, feedrate: Option<f64>) -> Result<()> {
    match feedrate {
        Some(f) if f <= 0.0 => Err(MoonrakerError::validation(
            method,
            "feedrate must be positive",
        )),
        _ => Ok(()),
    }
}

fn home_gcode(axes: &str) -> String {
    if axes.is_empty() {
        return "G28".to_string();
    }
    let mut gcode = String::from("G28");
    for axis in axes.chars() {
        gcode.push(' ');
        gcode.push(axis.to_ascii_uppercase());
    }
    gcode
}

fn relative_move_gcode(axis: char, distance: f64, feedrate: Option<f64>) -> String {
    let mut gcode = format!("G91\nG0 {}{}", axis.to_ascii_uppercase(), distance);
    if let Some(f) = feedrate {
        gcode.push_str(&format!(" F{f}"));
    }
    gcode.push_str("\nG90");
    gcode
}

fn absolute_move_gcode(axis: char, position: f64, feedrate: Option<f64>) -> String {
    let mut gcode = format!("G90\nG0 {}{}", axis.to_ascii_uppercase(), position);
    if let Some(f) = feedrate {
        gcode.push_str(&format!(" F{f}"));
    }
    gcode
}

fn fan_gcode(fan: &str, speed: f64) -> String {
    if fan == "fan" {
        let value = (speed * 255.0 / 100.0) as i32;
        format!("M106 S{value}")
    } else {
        format!("SET_FAN_SPEED FAN={fan} SPEED={}", speed / 100.0)
    }
}
