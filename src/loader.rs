//! Tab-separated particle files
//!
//! The first non-comment line is a header naming the columns. `px py pz vx
//! vy vz m` are required in any order; `r g b` colour columns (0-255) are
//! accepted and ignored, as is anything else.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use glam::Vec3;
use nbody_physics::Particle;
use thiserror::Error;

const REQUIRED_COLUMNS: [&str; 7] = ["px", "py", "pz", "vx", "vy", "vz", "m"];
const COLOR_COLUMNS: [&str; 3] = ["r", "g", "b"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read particle file: {0}")]
    Io(#[from] std::io::Error),

    #[error("particle file has no header row")]
    MissingHeader,

    #[error("header is missing column '{0}'")]
    MissingColumn(&'static str),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("line {line}: mass must be positive, got {mass}")]
    NonPositiveMass { line: usize, mass: f32 },
}

/// Read every particle from `path`.
pub fn load_particles(path: impl AsRef<Path>) -> Result<Vec<Particle>, LoadError> {
    let file = File::open(path.as_ref())?;
    parse_particles(BufReader::new(file))
}

/// Parse particles from any buffered reader. Blank lines and lines starting
/// with `#` are skipped.
pub fn parse_particles<R: BufRead>(reader: R) -> Result<Vec<Particle>, LoadError> {
    let mut columns: Option<Columns> = None;
    let mut particles = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let number = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        match &columns {
            None => columns = Some(Columns::from_header(trimmed)?),
            Some(columns) => particles.push(columns.parse_row(&line, number)?),
        }
    }

    if columns.is_none() {
        return Err(LoadError::MissingHeader);
    }
    Ok(particles)
}

/// Write particles with the full `px py pz vx vy vz m` header, readable by
/// [`parse_particles`].
pub fn write_particles<W: Write>(mut writer: W, particles: &[Particle]) -> std::io::Result<()> {
    writeln!(writer, "{}", REQUIRED_COLUMNS.join("\t"))?;
    for p in particles {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            p.pos[0], p.pos[1], p.pos[2], p.vel[0], p.vel[1], p.vel[2], p.weight
        )?;
    }
    writer.flush()
}

/// Field index of each required column, plus the colour columns if all
/// three are present.
struct Columns {
    required: [usize; 7],
    color: Option<[usize; 3]>,
    width: usize,
    tab_separated: bool,
}

/// Tab-separated rows keep empty fields in place; otherwise any run of
/// whitespace separates fields.
fn split_fields(line: &str, tab_separated: bool) -> Vec<&str> {
    if tab_separated {
        line.split('\t').map(str::trim).collect()
    } else {
        line.split_whitespace().collect()
    }
}

impl Columns {
    fn from_header(line: &str) -> Result<Self, LoadError> {
        let tab_separated = line.contains('\t');
        let header = split_fields(line, tab_separated);
        let find = |name: &str| header.iter().position(|h| h.eq_ignore_ascii_case(name));

        let mut required = [0; 7];
        for (slot, name) in required.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = find(name).ok_or(LoadError::MissingColumn(name))?;
        }

        let color = match COLOR_COLUMNS.map(find) {
            [Some(r), Some(g), Some(b)] => Some([r, g, b]),
            _ => None,
        };

        let width = required
            .iter()
            .chain(color.iter().flatten())
            .max()
            .map_or(0, |max| max + 1);

        Ok(Self {
            required,
            color,
            width,
            tab_separated,
        })
    }

    fn parse_row(&self, row: &str, line: usize) -> Result<Particle, LoadError> {
        let fields = split_fields(row, self.tab_separated);
        if fields.len() < self.width {
            return Err(LoadError::Parse {
                line,
                message: format!("expected {} fields, found {}", self.width, fields.len()),
            });
        }

        let mut values = [0.0_f32; 7];
        let columns = self.required.iter().zip(REQUIRED_COLUMNS);
        for (value, (&column, name)) in values.iter_mut().zip(columns) {
            *value = parse_field(fields[column], name, line)?;
        }

        if let Some(color) = self.color {
            for (&column, name) in color.iter().zip(COLOR_COLUMNS) {
                fields[column].parse::<u8>().map_err(|e| LoadError::Parse {
                    line,
                    message: format!("column '{name}': {e}"),
                })?;
            }
        }

        let [px, py, pz, vx, vy, vz, mass] = values;
        if mass <= 0.0 {
            return Err(LoadError::NonPositiveMass { line, mass });
        }

        Ok(Particle::new(
            Vec3::new(px, py, pz),
            Vec3::new(vx, vy, vz),
            mass,
        ))
    }
}

fn parse_field(field: &str, name: &str, line: usize) -> Result<f32, LoadError> {
    let value: f32 = field.parse().map_err(|e| LoadError::Parse {
        line,
        message: format!("column '{name}': {e}"),
    })?;
    if !value.is_finite() {
        return Err(LoadError::Parse {
            line,
            message: format!("column '{name}' is not finite"),
        });
    }
    Ok(value)
}
