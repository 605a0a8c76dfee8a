//! Point probes that record the values of finite element functions over time.
//!
//! A probe locates its point in the mesh once, and stores the cell nodes and basis weights
//! needed to evaluate any function of the probed space there. Every evaluation appends a
//! snapshot of all components.
use crate::space::{Function, FunctionSpace};
use eyre::{bail, eyre};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;

/// A single probe at a fixed point of the mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    point: Vec<f64>,
    cell: usize,
    nodes: Vec<usize>,
    basis_values: Vec<f64>,
    value_size: usize,
    snapshots: Vec<Vec<f64>>,
}

impl Probe {
    /// Creates a probe at `point`, or returns `None` if the point lies outside the mesh.
    pub fn new(point: &[f64], space: &FunctionSpace) -> Option<Self> {
        let (cell, lambda) = space.locate_point(point)?;
        Some(Self {
            point: point.to_vec(),
            cell,
            nodes: space.cell_nodes(cell).to_vec(),
            basis_values: space.basis().values(lambda.as_slice()),
            value_size: space.value_size(),
            snapshots: Vec::new(),
        })
    }

    pub fn point(&self) -> &[f64] {
        &self.point
    }

    /// The cell containing the point.
    pub fn cell(&self) -> usize {
        self.cell
    }

    pub fn value_size(&self) -> usize {
        self.value_size
    }

    pub fn number_of_evaluations(&self) -> usize {
        self.snapshots.len()
    }

    /// Evaluates `u` at the probe point and stores the result as a new snapshot.
    ///
    /// `u` must belong to a space with the node numbering the probe was created for.
    pub fn eval(&mut self, u: &Function) -> eyre::Result<()> {
        if u.value_size() != self.value_size {
            bail!(
                "probe has {} components, but the function has {}",
                self.value_size,
                u.value_size()
            );
        }
        let s = self.value_size;
        let coefficients = u.coefficients();
        let mut values = vec![0.0; s];
        for (&node, phi) in self.nodes.iter().zip(&self.basis_values) {
            for (c, value) in values.iter_mut().enumerate() {
                *value += phi
                    * coefficients
                        .get(s * node + c)
                        .ok_or_else(|| eyre!("function has no degree of freedom {}", s * node + c))?;
            }
        }
        self.snapshots.push(values);
        Ok(())
    }

    /// All components recorded at snapshot `i`.
    pub fn get_probe_at_snapshot(&self, i: usize) -> Option<&[f64]> {
        self.snapshots.get(i).map(Vec::as_slice)
    }

    /// Component `i` of every snapshot, in order of evaluation.
    pub fn get_probe_sub(&self, i: usize) -> Option<Vec<f64>> {
        (i < self.value_size).then(|| self.snapshots.iter().map(|snapshot| snapshot[i]).collect())
    }

    pub fn erase_snapshot(&mut self, i: usize) {
        if i < self.snapshots.len() {
            self.snapshots.remove(i);
        }
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

/// Serializable record of one probe and its snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeRecord {
    pub id: usize,
    pub point: Vec<f64>,
    pub snapshots: Vec<Vec<f64>>,
}

/// A collection of probes of the same function space.
///
/// Probes are identified by the index of their point in the list passed to [`Probes::new`].
/// Points outside the mesh get no probe, so the ids of the remaining probes need not be
/// contiguous.
#[derive(Debug, Clone)]
pub struct Probes {
    space: Arc<FunctionSpace>,
    probes: Vec<(usize, Probe)>,
    total_number_probes: usize,
    num_evals: usize,
}

impl Probes {
    /// Creates probes at the given points, stored as consecutive coordinate tuples.
    pub fn new(points: &[f64], space: Arc<FunctionSpace>) -> eyre::Result<Self> {
        let dim = space.mesh().geometry_dim();
        if points.len() % dim != 0 {
            bail!(
                "probe coordinates must come in tuples of {}, got {} values",
                dim,
                points.len()
            );
        }
        let total_number_probes = points.len() / dim;
        let probes = points
            .chunks_exact(dim)
            .enumerate()
            .filter_map(|(id, point)| Probe::new(point, &space).map(|probe| (id, probe)))
            .collect();
        Ok(Self {
            space,
            probes,
            total_number_probes,
            num_evals: 0,
        })
    }

    /// Evaluates every probe at `u`.
    pub fn eval(&mut self, u: &Function) -> eyre::Result<()> {
        if !u.space().has_same_layout(&self.space) {
            bail!("function does not belong to the probed function space");
        }
        for (_, probe) in &mut self.probes {
            probe.eval(u)?;
        }
        self.num_evals += 1;
        Ok(())
    }

    /// Number of probes whose point was found in the mesh.
    pub fn local_size(&self) -> usize {
        self.probes.len()
    }

    /// Number of points the probes were requested for, including those outside the mesh.
    pub fn get_total_number_probes(&self) -> usize {
        self.total_number_probes
    }

    pub fn value_size(&self) -> usize {
        self.space.value_size()
    }

    pub fn number_of_evaluations(&self) -> usize {
        self.num_evals
    }

    /// The `i`-th located probe.
    pub fn get_probe(&self, i: usize) -> Option<&Probe> {
        self.probes.get(i).map(|(_, probe)| probe)
    }

    /// Id (index of the requested point) of the `i`-th located probe.
    pub fn get_probe_id(&self, i: usize) -> Option<usize> {
        self.probes.get(i).map(|(id, _)| *id)
    }

    pub fn erase_snapshot(&mut self, i: usize) {
        if i >= self.num_evals {
            return;
        }
        for (_, probe) in &mut self.probes {
            probe.erase_snapshot(i);
        }
        self.num_evals -= 1;
    }

    /// Deletes all recorded snapshots.
    pub fn clear(&mut self) {
        for (_, probe) in &mut self.probes {
            probe.clear();
        }
        self.num_evals = 0;
    }

    pub fn records(&self) -> Vec<ProbeRecord> {
        self.probes
            .iter()
            .map(|(id, probe)| ProbeRecord {
                id: *id,
                point: probe.point.clone(),
                snapshots: probe.snapshots.clone(),
            })
            .collect()
    }

    /// Writes one line per probe and snapshot: the probe id, the snapshot index and all
    /// components.
    pub fn dump(&self, mut writer: impl Write) -> io::Result<()> {
        for (id, probe) in &self.probes {
            for (i, snapshot) in probe.snapshots.iter().enumerate() {
                write!(writer, "{} {}", id, i)?;
                for value in snapshot {
                    write!(writer, " {:.16e}", value)?;
                }
                writeln!(writer)?;
            }
        }
        Ok(())
    }

    /// Writes one line per probe: the probe id followed by component `i` of every snapshot.
    pub fn dump_component(&self, i: usize, mut writer: impl Write) -> io::Result<()> {
        if i >= self.value_size() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("component {} out of range for value size {}", i, self.value_size()),
            ));
        }
        for (id, probe) in &self.probes {
            write!(writer, "{}", id)?;
            for snapshot in &probe.snapshots {
                write!(writer, " {:.16e}", snapshot[i])?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

/// Named collections of probes, e.g. one per field of a simulation.
#[derive(Debug, Clone, Default)]
pub struct ProbeDict {
    probes: BTreeMap<String, Probes>,
}

impl ProbeDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, probes: Probes) -> Option<Probes> {
        self.probes.insert(name.into(), probes)
    }

    pub fn get(&self, name: &str) -> Option<&Probes> {
        self.probes.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Probes> {
        self.probes.get_mut(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.probes.keys().map(String::as_str)
    }

    /// Evaluates the probes registered under each given name. Functions without probes are
    /// ignored.
    pub fn probe<'a>(&mut self, functions: impl IntoIterator<Item = (&'a str, &'a Function)>) -> eyre::Result<()> {
        for (name, function) in functions {
            if let Some(probes) = self.probes.get_mut(name) {
                probes
                    .eval(function)
                    .map_err(|err| eyre!("probing {} failed: {}", name, err))?;
            }
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        for probes in self.probes.values_mut() {
            probes.clear();
        }
    }

    /// Serializable records of all probes, by name.
    pub fn records(&self) -> BTreeMap<String, Vec<ProbeRecord>> {
        self.probes
            .iter()
            .map(|(name, probes)| (name.clone(), probes.records()))
            .collect()
    }

    /// Dumps every collection after a `# name` header line.
    pub fn dump(&self, mut writer: impl Write) -> io::Result<()> {
        for (name, probes) in &self.probes {
            writeln!(writer, "# {}", name)?;
            probes.dump(&mut writer)?;
        }
        Ok(())
    }
}
