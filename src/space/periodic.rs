use crate::mesh::Mesh;
use crate::space::ConstrainedDomain;
use eyre::eyre;
use rustc_hash::FxHashMap;

/// Periodicity of an axis-aligned box along a subset of its axes.
///
/// Points on the upper face of a periodic axis are identified with the corresponding points
/// on the lower face. Points on several upper faces are mapped along all of those axes at once.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicBoundary {
    lower: Vec<f64>,
    upper: Vec<f64>,
    periodic: Vec<bool>,
    tolerance: f64,
}

impl PeriodicBoundary {
    /// Periodicity along the axes for which `periodic` is `true`.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>, periodic: Vec<bool>) -> eyre::Result<Self> {
        if lower.len() != upper.len() || lower.len() != periodic.len() {
            return Err(eyre!("bounds and periodic axes must have the same dimension"));
        }
        if lower.iter().zip(&upper).any(|(l, u)| l >= u) {
            return Err(eyre!("lower bounds must be smaller than upper bounds"));
        }
        let diameter = lower
            .iter()
            .zip(&upper)
            .map(|(l, u)| (u - l) * (u - l))
            .sum::<f64>()
            .sqrt();
        Ok(Self {
            lower,
            upper,
            periodic,
            tolerance: 1e-10 * diameter,
        })
    }

    /// Periodicity along every axis.
    pub fn fully_periodic(lower: Vec<f64>, upper: Vec<f64>) -> eyre::Result<Self> {
        let periodic = vec![true; lower.len()];
        Self::new(lower, upper, periodic)
    }

    fn near(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.tolerance
    }
}

impl ConstrainedDomain for PeriodicBoundary {
    fn inside(&self, x: &[f64]) -> bool {
        let periodic_axes = || self.periodic.iter().enumerate().filter(|&(_, &p)| p).map(|(i, _)| i);
        let on_lower = periodic_axes().any(|i| self.near(x[i], self.lower[i]));
        let on_upper = periodic_axes().any(|i| self.near(x[i], self.upper[i]));
        on_lower && !on_upper
    }

    fn map(&self, x: &[f64]) -> Option<Vec<f64>> {
        let mut y = x.to_vec();
        let mut mapped = false;
        for (i, &periodic) in self.periodic.iter().enumerate() {
            if periodic && self.near(x[i], self.upper[i]) {
                y[i] = self.lower[i] + (x[i] - self.upper[i]);
                mapped = true;
            }
        }
        mapped.then_some(y)
    }
}

/// For every vertex, the vertex it is identified with under the constraint (itself if it is
/// not constrained).
pub(crate) fn master_vertices(mesh: &Mesh, domain: &dyn ConstrainedDomain) -> eyre::Result<Vec<usize>> {
    let dim = mesh.geometry_dim();
    let num_vertices = mesh.num_vertices();

    let (min, max) = bounding_box(mesh);
    let diameter = min
        .iter()
        .zip(&max)
        .map(|(a, b)| (b - a) * (b - a))
        .sum::<f64>()
        .sqrt();
    let tolerance = (1e-8 * diameter).max(f64::MIN_POSITIVE);

    let quantize = |x: &[f64]| -> Vec<i64> { x.iter().map(|x_i| (x_i / tolerance).round() as i64).collect() };
    let mut lookup = FxHashMap::default();
    for v in 0..num_vertices {
        lookup.entry(quantize(mesh.vertex(v))).or_insert(v);
    }
    let find_vertex = |y: &[f64]| -> Option<usize> {
        lookup.get(&quantize(y)).copied().or_else(|| {
            // Points close to a quantization boundary may round to a neighboring cell
            (0..num_vertices).find(|&v| {
                mesh.vertex(v)
                    .iter()
                    .zip(y)
                    .all(|(a, b)| (a - b).abs() <= tolerance)
            })
        })
    };

    let mut master: Vec<usize> = (0..num_vertices).collect();
    for v in 0..num_vertices {
        let mut current = v;
        // Each step moves the vertex onto at least one more lower face
        for _ in 0..dim {
            match domain.map(mesh.vertex(current)) {
                Some(y) if domain.inside(&y) => {
                    let target = find_vertex(&y).ok_or_else(|| {
                        eyre!(
                            "vertex {} is constrained, but no vertex matches its image {:?}",
                            current,
                            y
                        )
                    })?;
                    if target == current {
                        break;
                    }
                    current = target;
                }
                _ => break,
            }
        }
        master[v] = current;
    }
    Ok(master)
}

fn bounding_box(mesh: &Mesh) -> (Vec<f64>, Vec<f64>) {
    let dim = mesh.geometry_dim();
    let mut min = vec![f64::INFINITY; dim];
    let mut max = vec![f64::NEG_INFINITY; dim];
    for x in mesh.vertices().chunks_exact(dim) {
        for i in 0..dim {
            min[i] = min[i].min(x[i]);
            max[i] = max[i].max(x[i]);
        }
    }
    (min, max)
}
