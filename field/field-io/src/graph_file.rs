//! Binary surfel graph file format.
//!
//! # Format
//!
//! All integers and floats are little-endian.
//!
//! ```text
//! [UINT16 marker 0xa9f1, UINT16 flags]   – optional; absent in lean files
//! UINT32        – node count
//! foreach node
//!     UINT32 + bytes       – surfel id
//!     UINT32               – frame count
//!     foreach frame
//!         UINT64 ×3        – pixel x, pixel y, frame index
//!         REAL32           – depth
//!         REAL32 ×9        – transform, row-major
//!         REAL32 ×3        – normal
//!         REAL32 ×3        – position
//!     UINT32 + ids         – neighbour surfel ids
//!     REAL32 ×3            – tangent
//!     REAL32 ×2            – reference lattice offset
//!     [REAL32 ×2]          – rosy, posy smoothness iff SMOOTHNESS flag
//! [edge section iff EDGES flag]
//! UINT32        – edge count
//! foreach edge
//!     UINT32 + bytes       – from surfel id
//!     UINT32 + bytes       – to surfel id
//!     REAL32               – weight
//!     UINT64               – k pair count (historical; now always 1)
//!     UINT16 ×2            – k_ij, k_ji
//!     UINT64               – t frame count
//!     INT32 ×4 per frame   – t_ij, t_ji
//! end
//! ```
//!
//! Lean files carry no edge section; edges are rebuilt from the neighbour id
//! lists with weight 1.0.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use field_surfel::{
    FrameData, PixelInFrame, SurfelBuilder, SurfelGraph, SurfelGraphEdge,
};
use nalgebra::{Matrix3, Point3, Vector2, Vector3};
use rand::Rng;
use tracing::{debug, warn};

use crate::error::{IoError, IoResult};

/// Marker announcing a flags word at the start of the file.
const FLAGS_MARKER: u16 = 0xa9f1;

/// Flag bit: per-surfel smoothness scalars are present.
const FLAG_SMOOTHNESS: u16 = 1;

/// Flag bit: a full edge section follows the nodes.
const FLAG_EDGES: u16 = 2;

/// Which optional sections a graph file carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphFileFlags {
    /// Per-surfel rosy and posy smoothness scalars.
    pub smoothness: bool,
    /// Full per-edge weight, k, and t data.
    pub edges: bool,
}

impl GraphFileFlags {
    fn to_bits(self) -> u16 {
        let mut bits = 0;
        if self.smoothness {
            bits |= FLAG_SMOOTHNESS;
        }
        if self.edges {
            bits |= FLAG_EDGES;
        }
        bits
    }

    fn from_bits(bits: u16) -> Self {
        Self {
            smoothness: bits & FLAG_SMOOTHNESS != 0,
            edges: bits & FLAG_EDGES != 0,
        }
    }
}

/// Load a surfel graph from a binary file.
///
/// The RNG seeds surfel construction defaults; a well-formed file overrides
/// every randomised field, so the loaded graph does not depend on it.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is truncated, or references
/// undeclared surfel ids in its edge section.
pub fn load_surfel_graph<P: AsRef<Path>>(
    path: P,
    rng: &mut impl Rng,
) -> IoResult<(SurfelGraph, GraphFileFlags)> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IoError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            IoError::Io(e)
        }
    })?;
    let mut reader = BufReader::new(file);

    // The flags word is optional; lean files open directly with the node
    // count, whose first two bytes we have already consumed.
    let first = read_u16(&mut reader)?;
    let (flags, num_nodes) = if first == FLAGS_MARKER {
        let flags = GraphFileFlags::from_bits(read_u16(&mut reader)?);
        (flags, read_u32(&mut reader)?)
    } else {
        let second = read_u16(&mut reader)?;
        let count = u32::from(first) | (u32::from(second) << 16);
        (GraphFileFlags::default(), count)
    };
    debug!(num_nodes, ?flags, "loading surfel graph");

    let mut graph = SurfelGraph::new();
    let mut neighbour_ids: Vec<(String, Vec<String>)> = Vec::with_capacity(num_nodes as usize);

    for _ in 0..num_nodes {
        let id = read_string(&mut reader)?;

        let num_frames = read_u32(&mut reader)?;
        let mut frames = Vec::with_capacity(num_frames as usize);
        for _ in 0..num_frames {
            frames.push(read_frame_data(&mut reader)?);
        }

        let num_neighbours = read_u32(&mut reader)?;
        let mut neighbours = Vec::with_capacity(num_neighbours as usize);
        for _ in 0..num_neighbours {
            neighbours.push(read_string(&mut reader)?);
        }

        let tangent = read_vector3(&mut reader)?;
        let offset = Vector2::new(read_f32(&mut reader)?, read_f32(&mut reader)?);

        let mut builder = SurfelBuilder::new(rng)
            .with_id(id.clone())
            .with_tangent(tangent)
            .with_reference_lattice_offset(offset);
        for frame_data in frames {
            builder = builder.with_frame(frame_data);
        }
        let node = graph.add_surfel(builder.build())?;

        if flags.smoothness {
            let rosy = read_f32(&mut reader)?;
            let posy = read_f32(&mut reader)?;
            let surfel = graph.surfel_mut(node)?;
            surfel.set_rosy_smoothness(rosy);
            surfel.set_posy_smoothness(posy);
        }
        neighbour_ids.push((id, neighbours));
    }

    if flags.edges {
        read_edges(&mut reader, &mut graph)?;
    } else {
        rebuild_edges_from_neighbours(&mut graph, &neighbour_ids)?;
    }

    Ok((graph, flags))
}

/// Save a surfel graph to a binary file.
///
/// `flags` chooses between a lean snapshot (neighbour lists only) and a full
/// one carrying smoothness and edge labelling. A file with neither flag set
/// is written without the flags word for compatibility with lean readers.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_surfel_graph<P: AsRef<Path>>(
    graph: &SurfelGraph,
    path: P,
    flags: GraphFileFlags,
) -> IoResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    if flags != GraphFileFlags::default() {
        writer.write_all(&FLAGS_MARKER.to_le_bytes())?;
        writer.write_all(&flags.to_bits().to_le_bytes())?;
    }

    let node_ids = graph.node_ids();
    #[allow(clippy::cast_possible_truncation)]
    writer.write_all(&(node_ids.len() as u32).to_le_bytes())?;

    for &node in &node_ids {
        let surfel = graph.surfel(node)?;
        write_string(&mut writer, surfel.id())?;

        #[allow(clippy::cast_possible_truncation)]
        writer.write_all(&(surfel.num_frames() as u32).to_le_bytes())?;
        for frame_data in surfel.frame_data() {
            write_frame_data(&mut writer, frame_data)?;
        }

        let neighbours = graph.neighbours(node)?;
        #[allow(clippy::cast_possible_truncation)]
        writer.write_all(&(neighbours.len() as u32).to_le_bytes())?;
        for nbr in neighbours {
            write_string(&mut writer, graph.surfel(nbr)?.id())?;
        }

        write_vector3(&mut writer, surfel.tangent())?;
        let offset = surfel.reference_lattice_offset();
        writer.write_all(&offset.x.to_le_bytes())?;
        writer.write_all(&offset.y.to_le_bytes())?;

        if flags.smoothness {
            writer.write_all(&surfel.rosy_smoothness().to_le_bytes())?;
            writer.write_all(&surfel.posy_smoothness().to_le_bytes())?;
        }
    }

    if flags.edges {
        write_edges(&mut writer, graph)?;
    }

    writer.flush()?;
    Ok(())
}

fn read_edges(reader: &mut impl Read, graph: &mut SurfelGraph) -> IoResult<()> {
    let num_edges = read_u32(reader)?;
    for _ in 0..num_edges {
        let from_id = read_string(reader)?;
        let to_id = read_string(reader)?;
        let weight = read_f32(reader)?;

        let from = graph
            .node_for_id(&from_id)
            .map_err(|_| IoError::UnknownEdgeEndpoint { id: from_id })?;
        let to = graph
            .node_for_id(&to_id)
            .map_err(|_| IoError::UnknownEdgeEndpoint { id: to_id })?;
        graph.add_edge(from, to, SurfelGraphEdge::new(weight))?;

        let num_k = read_u64(reader)?;
        if num_k != 1 {
            return Err(IoError::invalid_content(format!(
                "expected 1 k pair per edge, found {num_k}"
            )));
        }
        let k_ij = read_u16(reader)?;
        let k_ji = read_u16(reader)?;
        graph.set_k(from, k_ij, to, k_ji)?;

        let num_t = read_u64(reader)?;
        #[allow(clippy::cast_possible_truncation)]
        for frame in 0..num_t as usize {
            let t_ij = Vector2::new(read_i32(reader)?, read_i32(reader)?);
            let t_ji = Vector2::new(read_i32(reader)?, read_i32(reader)?);
            graph.set_t(from, t_ij, to, t_ji, frame)?;
        }
    }
    Ok(())
}

fn write_edges(writer: &mut impl Write, graph: &SurfelGraph) -> IoResult<()> {
    let edges = graph.edges();
    #[allow(clippy::cast_possible_truncation)]
    writer.write_all(&(edges.len() as u32).to_le_bytes())?;

    for (a, b) in edges {
        write_string(writer, graph.surfel(a)?.id())?;
        write_string(writer, graph.surfel(b)?.id())?;

        let edge = graph.edge(a, b)?;
        writer.write_all(&edge.weight().to_le_bytes())?;

        writer.write_all(&1_u64.to_le_bytes())?;
        let (k_ij, k_ji) = graph.k(a, b)?;
        writer.write_all(&k_ij.to_le_bytes())?;
        writer.write_all(&k_ji.to_le_bytes())?;

        let num_t = edge.num_t_frames();
        writer.write_all(&(num_t as u64).to_le_bytes())?;
        for frame in 0..num_t {
            let (t_ij, t_ji) = graph.t(a, b, frame)?;
            writer.write_all(&t_ij.x.to_le_bytes())?;
            writer.write_all(&t_ij.y.to_le_bytes())?;
            writer.write_all(&t_ji.x.to_le_bytes())?;
            writer.write_all(&t_ji.y.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Lean files carry only neighbour id lists; each undirected pair appears in
/// both lists, so the second sighting is skipped.
fn rebuild_edges_from_neighbours(
    graph: &mut SurfelGraph,
    neighbour_ids: &[(String, Vec<String>)],
) -> IoResult<()> {
    for (id, neighbours) in neighbour_ids {
        let node = graph
            .node_for_id(id)
            .map_err(|_| IoError::UnknownEdgeEndpoint { id: id.clone() })?;
        for nbr_id in neighbours {
            let Ok(nbr) = graph.node_for_id(nbr_id) else {
                warn!(id = %nbr_id, "skipping neighbour with unknown id");
                continue;
            };
            if graph.has_edge(node, nbr) {
                continue;
            }
            graph.add_edge(node, nbr, SurfelGraphEdge::new(1.0))?;
        }
    }
    Ok(())
}

fn read_frame_data(reader: &mut impl Read) -> IoResult<FrameData> {
    #[allow(clippy::cast_possible_truncation)]
    let pixel_in_frame = PixelInFrame::new(
        read_u64(reader)? as usize,
        read_u64(reader)? as usize,
        read_u64(reader)? as usize,
    );
    let depth = read_f32(reader)?;
    let transform = read_matrix3(reader)?;
    let normal = read_vector3(reader)?;
    let position = Point3::from(read_vector3(reader)?);
    Ok(FrameData::new(pixel_in_frame, depth, transform, normal, position))
}

fn write_frame_data(writer: &mut impl Write, frame_data: &FrameData) -> IoResult<()> {
    writer.write_all(&(frame_data.pixel_in_frame.x as u64).to_le_bytes())?;
    writer.write_all(&(frame_data.pixel_in_frame.y as u64).to_le_bytes())?;
    writer.write_all(&(frame_data.pixel_in_frame.frame as u64).to_le_bytes())?;
    writer.write_all(&frame_data.depth.to_le_bytes())?;
    write_matrix3(writer, &frame_data.transform)?;
    write_vector3(writer, frame_data.normal)?;
    write_vector3(writer, frame_data.position.coords)?;
    Ok(())
}

fn read_matrix3(reader: &mut impl Read) -> IoResult<Matrix3<f32>> {
    let mut values = [0.0_f32; 9];
    for value in &mut values {
        *value = read_f32(reader)?;
    }
    Ok(Matrix3::new(
        values[0], values[1], values[2], values[3], values[4], values[5], values[6], values[7],
        values[8],
    ))
}

fn write_matrix3(writer: &mut impl Write, matrix: &Matrix3<f32>) -> IoResult<()> {
    for row in 0..3 {
        for col in 0..3 {
            writer.write_all(&matrix[(row, col)].to_le_bytes())?;
        }
    }
    Ok(())
}

fn read_vector3(reader: &mut impl Read) -> IoResult<Vector3<f32>> {
    Ok(Vector3::new(
        read_f32(reader)?,
        read_f32(reader)?,
        read_f32(reader)?,
    ))
}

fn write_vector3(writer: &mut impl Write, v: Vector3<f32>) -> IoResult<()> {
    writer.write_all(&v.x.to_le_bytes())?;
    writer.write_all(&v.y.to_le_bytes())?;
    writer.write_all(&v.z.to_le_bytes())?;
    Ok(())
}

fn read_string(reader: &mut impl Read) -> IoResult<String> {
    let len = read_u32(reader)?;
    let mut buf = vec![0_u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

fn write_string(writer: &mut impl Write, s: &str) -> IoResult<()> {
    #[allow(clippy::cast_possible_truncation)]
    writer.write_all(&(s.len() as u32).to_le_bytes())?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}

fn read_u16(reader: &mut impl Read) -> IoResult<u16> {
    let mut buf = [0_u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(reader: &mut impl Read) -> IoResult<u32> {
    let mut buf = [0_u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut impl Read) -> IoResult<u64> {
    let mut buf = [0_u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_i32(reader: &mut impl Read) -> IoResult<i32> {
    let mut buf = [0_u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_f32(reader: &mut impl Read) -> IoResult<f32> {
    let mut buf = [0_u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}
