//! Plain-text Wavefront OBJ listing of the live mesh.

use std::io::{self, Write};

use crate::staging::{Color, Vertex};

/// Writes `v x y z r g b` lines followed by 1-based `f a b c` lines.
///
/// All-zero face triples mark nullified slots and are skipped. Returns the
/// number of faces written.
pub fn write_obj<W: Write>(
    mut out: W,
    vertices: &[Vertex],
    colors: &[Color],
    faces: &[u32],
) -> io::Result<usize> {
    for (position, color) in vertices.iter().zip(colors) {
        writeln!(
            out,
            "v {} {} {} {} {} {}",
            position[0], position[1], position[2], color[0], color[1], color[2]
        )?;
    }

    let mut written = 0;
    for face in faces.chunks_exact(3) {
        if face == [0, 0, 0] {
            continue;
        }
        writeln!(out, "f {} {} {}", face[0] + 1, face[1] + 1, face[2] + 1)?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}
