//! Test data builders for structures and structure files

use std::path::Path;

use mlip_core::Structure;

/// A one-atom frame whose comment line carries `index`, so frames stay
/// distinguishable after a round trip through files.
pub fn structure(index: usize) -> Structure {
    Structure::from_frame(format!(
        "1\nLattice=\"4 0 0 0 4 0 0 0 4\" index={index}\nNa {index}.0 0.0 0.0\n"
    ))
}

/// Frames `structure(start)` .. `structure(start + count - 1)`
pub fn structures(start: usize, count: usize) -> Vec<Structure> {
    (start..start + count).map(structure).collect()
}

/// Same frame with an energy appended to the comment line, as a reference
/// calculation would write it.
pub fn labeled(structure: &Structure, energy: f64) -> Structure {
    let frame = structure.as_frame();
    let mut lines: Vec<String> = frame.lines().map(str::to_string).collect();
    if lines.len() > 1 {
        lines[1] = format!("{} energy={energy}", lines[1]);
    }
    Structure::from_frame(lines.join("\n"))
}

/// Write frames synchronously; for test setup only.
pub fn write_structures(path: &Path, structures: &[Structure]) -> std::io::Result<()> {
    let text: String = structures.iter().map(Structure::as_frame).collect();
    std::fs::write(path, text)
}

/// Index carried by a frame built with [`structure`], if any.
pub fn index_of(structure: &Structure) -> Option<usize> {
    structure
        .comment()?
        .split_whitespace()
        .find_map(|field| field.strip_prefix("index="))
        .and_then(|value| value.parse().ok())
}
