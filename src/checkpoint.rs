use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use crate::error::Error;
use crate::index_space::{range2d, IndexSpace};
use crate::state::LevelData;

const HEADER_TITLE: &str = "strata checkpoint";




/**
 * Everything needed to resume a run: per-level step counts, time steps,
 * times, box lists, and the current field snapshot. Only the "new" snapshot
 * is persisted; a restarted run begins as if the level had just been
 * created, with no old data to interpolate against.
 */
pub struct Checkpoint {
    pub finest_level: usize,
    pub istep: Vec<u64>,
    pub dt: Vec<f64>,
    pub t_new: Vec<f64>,
    pub boxes: Vec<Vec<IndexSpace>>,
    pub data: Vec<LevelData>,
}




/**
 * Write a checkpoint directory: a human-readable `Header` with the run
 * metadata and box lists, and one CBOR file of field data per level.
 * Floating point values go through the shortest round-trippable decimal
 * form, so reading them back is exact.
 */
pub fn write_checkpoint(dir: &Path, chk: &Checkpoint) -> Result<(), Error> {
    std::fs::create_dir_all(dir)?;

    let mut header = BufWriter::new(File::create(dir.join("Header"))?);

    writeln!(header, "{}", HEADER_TITLE)?;
    writeln!(header, "{}", chk.finest_level)?;
    writeln!(header, "{}", join(chk.istep.iter()))?;
    writeln!(header, "{}", join(chk.dt.iter()))?;
    writeln!(header, "{}", join(chk.t_new.iter()))?;

    for boxes in &chk.boxes {
        writeln!(header, "{}", boxes.len())?;
        for b in boxes {
            let (i0, j0) = b.start();
            let (i1, j1) = b.end();
            writeln!(header, "{} {} {} {}", i0, j0, i1, j1)?;
        }
    }
    header.flush()?;

    for (lev, data) in chk.data.iter().enumerate() {
        let file = BufWriter::new(File::create(dir.join(format!("Level_{}.cbor", lev)))?);
        ciborium::ser::into_writer(data, file)
            .map_err(|e| Error::Checkpoint(format!("level {} data: {}", lev, e)))?;
    }
    Ok(())
}




pub fn read_checkpoint(dir: &Path) -> Result<Checkpoint, Error> {
    let header = BufReader::new(File::open(dir.join("Header"))?);
    let mut lines = header.lines();

    let mut next = |what: &str| -> Result<String, Error> {
        match lines.next() {
            Some(line) => Ok(line?),
            None => Err(Error::Checkpoint(format!("header truncated at {}", what))),
        }
    };

    let title = next("title")?;
    if title != HEADER_TITLE {
        return Err(Error::Checkpoint(format!("unrecognized header title {:?}", title)));
    }
    let finest_level: usize = parse(&next("finest_level")?, "finest_level")?;
    let istep: Vec<u64> = parse_row(&next("istep")?, "istep")?;
    let dt: Vec<f64> = parse_row(&next("dt")?, "dt")?;
    let t_new: Vec<f64> = parse_row(&next("t_new")?, "t_new")?;

    let mut boxes = Vec::new();
    for lev in 0..finest_level + 1 {
        let count: usize = parse(&next("box count")?, "box count")?;
        let mut level_boxes = Vec::new();
        for _ in 0..count {
            let row: Vec<i64> = parse_row(&next("box extent")?, "box extent")?;
            if row.len() != 4 {
                return Err(Error::Checkpoint(format!("bad box extent at level {}", lev)));
            }
            level_boxes.push(range2d(row[0]..row[2], row[1]..row[3]));
        }
        boxes.push(level_boxes);
    }

    let mut data = Vec::new();
    for lev in 0..finest_level + 1 {
        let file = BufReader::new(File::open(dir.join(format!("Level_{}.cbor", lev)))?);
        let level_data: LevelData = ciborium::de::from_reader(file)
            .map_err(|e| Error::Checkpoint(format!("level {} data: {}", lev, e)))?;
        data.push(level_data);
    }

    Ok(Checkpoint { finest_level, istep, dt, t_new, boxes, data })
}




/**
 * Write a plotfile directory: the simulation time, the level-0 domain
 * extent, and the current field snapshot per level. Plotfiles are for
 * postprocessing only; nothing reads them back.
 */
pub fn write_plotfile(
    dir: &Path,
    time: f64,
    domain: &IndexSpace,
    data: &[&LevelData]) -> Result<(), Error>
{
    std::fs::create_dir_all(dir)?;

    let mut header = BufWriter::new(File::create(dir.join("Header"))?);
    writeln!(header, "strata plotfile")?;
    writeln!(header, "{}", time)?;
    writeln!(header, "{}", data.len())?;
    let (i0, j0) = domain.start();
    let (i1, j1) = domain.end();
    writeln!(header, "{} {} {} {}", i0, j0, i1, j1)?;
    header.flush()?;

    for (lev, level_data) in data.iter().enumerate() {
        let file = BufWriter::new(File::create(dir.join(format!("Level_{}.cbor", lev)))?);
        ciborium::ser::into_writer(level_data, file)
            .map_err(|e| Error::Checkpoint(format!("level {} data: {}", lev, e)))?;
    }
    Ok(())
}




fn join<T: std::fmt::Display>(values: impl Iterator<Item = T>) -> String {
    values
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}


fn parse<T: std::str::FromStr>(line: &str, what: &str) -> Result<T, Error> {
    line.trim()
        .parse()
        .map_err(|_| Error::Checkpoint(format!("bad {} value {:?}", what, line)))
}


fn parse_row<T: std::str::FromStr>(line: &str, what: &str) -> Result<Vec<T>, Error> {
    line.split_whitespace()
        .map(|tok| tok.parse().map_err(|_| {
            Error::Checkpoint(format!("bad {} value {:?}", what, tok))
        }))
        .collect()
}
