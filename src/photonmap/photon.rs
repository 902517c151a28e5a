//! Photon records.

use crate::geometry::{Normal3f, Point3f, Vector3f};
use crate::pbrt::{min, Float, PI, TWO_PI};
use crate::spectrum::Spectrum;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Number of entries in the precomputed spherical coordinate tables. The
/// compressed angles are single bytes, so each angle is quantized to one of
/// 256 values.
const TABLE_SIZE: usize = 256;

/// Precomputed tables shared by all photons: decompression of the
/// byte-quantized spherical angles and of the RGBE shared exponent.
struct PrecompTables {
    cos_theta: [Float; TABLE_SIZE],
    sin_theta: [Float; TABLE_SIZE],
    cos_phi: [Float; TABLE_SIZE],
    sin_phi: [Float; TABLE_SIZE],
    exp: [Float; TABLE_SIZE],
}

impl PrecompTables {
    fn new() -> Self {
        let mut tables = Self {
            cos_theta: [0.0; TABLE_SIZE],
            sin_theta: [0.0; TABLE_SIZE],
            cos_phi: [0.0; TABLE_SIZE],
            sin_phi: [0.0; TABLE_SIZE],
            exp: [0.0; TABLE_SIZE],
        };

        for i in 0..TABLE_SIZE {
            let angle = i as Float * (PI / TABLE_SIZE as Float);
            tables.cos_theta[i] = angle.cos();
            tables.sin_theta[i] = angle.sin();
            tables.cos_phi[i] = (2.0 * angle).cos();
            tables.sin_phi[i] = (2.0 * angle).sin();
            tables.exp[i] = (2.0 as Float).powi(i as i32 - (128 + 8));
        }

        // Exponent byte 0 marks a zero power.
        tables.exp[0] = 0.0;

        tables
    }
}

lazy_static! {
    static ref TABLES: PrecompTables = PrecompTables::new();
}

/// Quantize a unit direction into a `(phi, theta)` byte pair indexing the
/// precomputed spherical coordinate tables.
fn compress_direction(d: &Vector3f) -> (u8, u8) {
    let theta = min(255, (d.z.acos() * (TABLE_SIZE as Float / PI)) as i32);
    let mut phi = min(
        255,
        (d.y.atan2(d.x) * (TABLE_SIZE as Float / TWO_PI)) as i32,
    );
    if phi < 0 {
        phi += TABLE_SIZE as i32;
    }
    (phi as u8, theta as u8)
}

/// Decode a `(phi, theta)` byte pair into a unit direction.
fn decompress_direction(phi: u8, theta: u8) -> Vector3f {
    let (phi, theta) = (phi as usize, theta as usize);
    Vector3f::new(
        TABLES.cos_phi[phi] * TABLES.sin_theta[theta],
        TABLES.sin_phi[phi] * TABLES.sin_theta[theta],
        TABLES.cos_theta[theta],
    )
}

/// A point sample of light flux deposited at a surface or volume location
/// during particle tracing.
///
/// The record is kept deliberately small: the incident direction and the
/// surface normal are quantized to byte pairs of spherical angles and the
/// power is compressed into Ward's shared-exponent RGBE format, so a photon
/// occupies 24 bytes.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Photon {
    /// World-space position.
    pub pos: [Float; 3],

    /// Azimuth byte of the incident direction.
    phi: u8,

    /// Inclination byte of the incident direction.
    theta: u8,

    /// Azimuth byte of the surface normal.
    phi_n: u8,

    /// Inclination byte of the surface normal.
    theta_n: u8,

    /// Radiant power in RGBE format.
    power: [u8; 4],

    /// Bounce index at which the photon was deposited.
    depth: u16,

    /// Split axis at this photon's node, written while the map is balanced.
    pub(super) axis: u8,
}

impl Photon {
    /// Creates a new photon from an emitted particle's state.
    ///
    /// * `pos`    - Deposit position.
    /// * `normal` - Surface normal at the deposit point (zero in media).
    /// * `dir`    - Incident direction of the particle.
    /// * `power`  - Radiant power carried by the particle.
    /// * `depth`  - Bounce index at which the particle was deposited.
    pub fn new(
        pos: &Point3f,
        normal: &Normal3f,
        dir: &Vector3f,
        power: &Spectrum,
        depth: u16,
    ) -> Self {
        let (phi, theta) = compress_direction(dir);
        let (phi_n, theta_n) = compress_direction(&Vector3f::from(*normal));

        Self {
            pos: [pos.x, pos.y, pos.z],
            phi,
            theta,
            phi_n,
            theta_n,
            power: power.to_rgbe(),
            depth,
            axis: 0,
        }
    }

    /// Returns the photon's position.
    pub fn position(&self) -> Point3f {
        Point3f::new(self.pos[0], self.pos[1], self.pos[2])
    }

    /// Returns the incident direction of the particle when it was deposited.
    pub fn direction(&self) -> Vector3f {
        decompress_direction(self.phi, self.theta)
    }

    /// Returns the surface normal at the deposit point.
    pub fn normal(&self) -> Normal3f {
        Normal3f::from(decompress_direction(self.phi_n, self.theta_n))
    }

    /// Returns the radiant power carried by the photon.
    pub fn power(&self) -> Spectrum {
        let f = TABLES.exp[self.power[3] as usize];
        Spectrum::from_rgb(&[
            self.power[0] as Float * f,
            self.power[1] as Float * f,
            self.power[2] as Float * f,
        ])
    }

    /// Returns the bounce index at which the photon was deposited.
    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// Returns the squared distance between the photon and a position.
    ///
    /// * `p` - The position.
    #[inline(always)]
    pub fn distance_squared(&self, p: &[Float; 3]) -> Float {
        let dx = self.pos[0] - p[0];
        let dy = self.pos[1] - p[1];
        let dz = self.pos[2] - p[2];
        dx * dx + dy * dy + dz * dz
    }

    /// Writes the photon record to a binary stream.
    ///
    /// * `writer` - The output stream.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for p in self.pos.iter() {
            writer.write_f32::<LittleEndian>(*p)?;
        }
        writer.write_u8(self.phi)?;
        writer.write_u8(self.theta)?;
        writer.write_u8(self.phi_n)?;
        writer.write_u8(self.theta_n)?;
        writer.write_all(&self.power)?;
        writer.write_u16::<LittleEndian>(self.depth)?;
        writer.write_u8(self.axis)?;
        Ok(())
    }

    /// Reads a photon record from a binary stream.
    ///
    /// * `reader` - The input stream.
    pub fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut photon = Self::default();
        for p in photon.pos.iter_mut() {
            *p = reader.read_f32::<LittleEndian>()?;
        }
        photon.phi = reader.read_u8()?;
        photon.theta = reader.read_u8()?;
        photon.phi_n = reader.read_u8()?;
        photon.theta_n = reader.read_u8()?;
        reader.read_exact(&mut photon.power)?;
        photon.depth = reader.read_u16::<LittleEndian>()?;
        photon.axis = reader.read_u8()?;
        Ok(photon)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
