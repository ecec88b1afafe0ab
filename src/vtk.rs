use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use glam::DVec3;

use crate::particle::Particles;

/// Writes the owned particles as legacy ASCII VTK polydata.
pub fn write_vtk<P: AsRef<Path>>(filename: P, particles: &Particles) -> std::io::Result<()> {
    let file = File::create(filename)?;
    let mut writer = BufWriter::new(file);
    write_particles(&mut writer, particles)?;
    writer.flush()
}

pub fn write_particles<W: Write>(writer: &mut W, particles: &Particles) -> std::io::Result<()> {
    let n = particles.nlocal();

    writeln!(writer, "# vtk DataFile Version 3.0")?;
    writeln!(writer, "DEM Simulation Data")?;
    writeln!(writer, "ASCII")?;
    writeln!(writer, "DATASET POLYDATA")?;

    // Points
    writeln!(writer, "POINTS {} double", n)?;
    for x in &particles.x[..n] {
        writeln!(writer, "{} {} {}", x.x, x.y, x.z)?;
    }

    // Point Data (Attributes)
    writeln!(writer, "POINT_DATA {}", n)?;
    write_vectors(writer, "velocity", &particles.v[..n])?;
    write_vectors(writer, "omega", &particles.omega[..n])?;
    write_vectors(writer, "force", &particles.f[..n])?;

    writeln!(writer, "SCALARS radius double 1")?;
    writeln!(writer, "LOOKUP_TABLE default")?;
    for r in &particles.radius[..n] {
        writeln!(writer, "{}", r)?;
    }

    writeln!(writer, "SCALARS type int 1")?;
    writeln!(writer, "LOOKUP_TABLE default")?;
    for t in &particles.type_ids[..n] {
        writeln!(writer, "{}", t)?;
    }

    Ok(())
}

fn write_vectors<W: Write>(writer: &mut W, name: &str, values: &[DVec3]) -> std::io::Result<()> {
    writeln!(writer, "VECTORS {} double", name)?;
    for v in values {
        writeln!(writer, "{} {} {}", v.x, v.y, v.z)?;
    }
    Ok(())
}
