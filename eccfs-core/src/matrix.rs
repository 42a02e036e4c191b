use crate::error::{EccError, Result};
use crate::galois;

/// Row-major matrix of GF(2^8) elements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<u8>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { rows, cols, data: vec![0u8; rows * cols] }
    }

    pub fn identity(size: usize) -> Self {
        let mut m = Self::zeros(size, size);
        for i in 0..size {
            m.set(i, i, 1);
        }
        m
    }

    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self> {
        let cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(EccError::InvalidArgument("ragged matrix rows".to_string()));
        }
        Ok(Self { rows: rows.len(), cols, data: rows.concat() })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> u8 {
        self.data[r * self.cols + c]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, v: u8) {
        self.data[r * self.cols + c] = v;
    }

    pub fn row(&self, r: usize) -> &[u8] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for c in 0..self.cols {
            self.data.swap(a * self.cols + c, b * self.cols + c);
        }
    }

    pub fn multiply(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(EccError::InvalidArgument(format!(
                "cannot multiply {}x{} by {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        let mut out = Matrix::zeros(self.rows, other.cols);
        for r in 0..self.rows {
            for c in 0..other.cols {
                let mut acc = 0u8;
                for k in 0..self.cols {
                    acc = galois::add(acc, galois::mul(self.get(r, k), other.get(k, c)));
                }
                out.set(r, c, acc);
            }
        }
        Ok(out)
    }
}

/// Build the `rows x cols` dispersal matrix.
///
/// Starts from the Vandermonde matrix `v[i][j] = i^j` and applies column
/// operations until the top `cols` rows are the identity. Column operations
/// keep every `cols`-row subset invertible, so any `cols` of the `rows`
/// fragments reconstruct the data, and the data fragments stay verbatim.
pub fn dispersal_matrix(rows: usize, cols: usize) -> Result<Matrix> {
    if cols == 0 || cols > rows || rows >= galois::FIELD_SIZE {
        return Err(EccError::InvalidArgument(format!(
            "dispersal matrix {rows}x{cols}: need 0 < cols <= rows < {}",
            galois::FIELD_SIZE
        )));
    }
    let mut vdm = Matrix::zeros(rows, cols);
    for i in 0..rows {
        let mut k = 1u8;
        for j in 0..cols {
            vdm.set(i, j, k);
            k = galois::mul(k, i as u8);
        }
    }

    for i in 0..cols {
        let pivot = (i..rows).find(|&r| vdm.get(r, i) != 0).ok_or(EccError::Uninvertible)?;
        vdm.swap_rows(i, pivot);

        let diag = vdm.get(i, i);
        if diag != 1 {
            let scale = galois::inv(diag)?;
            for r in 0..rows {
                vdm.set(r, i, galois::mul(scale, vdm.get(r, i)));
            }
        }
        for j in 0..cols {
            let t = vdm.get(i, j);
            if j != i && t != 0 {
                for r in 0..rows {
                    let v = galois::add(vdm.get(r, j), galois::mul(t, vdm.get(r, i)));
                    vdm.set(r, j, v);
                }
            }
        }
    }
    Ok(vdm)
}

/// Square system picked out of a dispersal matrix for the surviving rows.
#[derive(Clone, Debug)]
pub struct CondensedMatrix {
    pub matrix: Matrix,
    /// `row_identities[i]` is the original row copied into condensed row `i`.
    pub row_identities: Vec<usize>,
}

/// Pick `cols` surviving rows of `matrix`.
///
/// A surviving data row `i < cols` keeps its own position; each missing data
/// row is filled by the next surviving parity row, in ascending order. Rows
/// beyond what is needed are ignored.
pub fn condense(matrix: &Matrix, exists: &[bool]) -> Result<CondensedMatrix> {
    let (rows, cols) = (matrix.rows(), matrix.cols());
    if exists.len() != rows {
        return Err(EccError::InvalidArgument(format!(
            "exists vector has {} entries for {rows} rows",
            exists.len()
        )));
    }
    let available = exists.iter().filter(|&&e| e).count();
    if available < cols {
        return Err(EccError::InsufficientFragments { found: available, needed: cols });
    }

    let mut condensed = Matrix::zeros(cols, cols);
    let mut row_identities = Vec::with_capacity(cols);
    let mut next_parity = cols;
    for i in 0..cols {
        let src = if exists[i] {
            i
        } else {
            while !exists[next_parity] {
                next_parity += 1;
            }
            next_parity += 1;
            next_parity - 1
        };
        for c in 0..cols {
            condensed.set(i, c, matrix.get(src, c));
        }
        row_identities.push(src);
    }
    Ok(CondensedMatrix { matrix: condensed, row_identities })
}

/// Gauss-Jordan inversion over GF(2^8). A singular input is `Uninvertible`.
pub fn invert(matrix: &Matrix) -> Result<Matrix> {
    let size = matrix.rows();
    if matrix.cols() != size {
        return Err(EccError::InvalidArgument(format!(
            "cannot invert non-square {}x{} matrix",
            size,
            matrix.cols()
        )));
    }
    let mut work = matrix.clone();
    let mut inv = Matrix::identity(size);

    for i in 0..size {
        let pivot = (i..size).find(|&r| work.get(r, i) != 0).ok_or(EccError::Uninvertible)?;
        work.swap_rows(i, pivot);
        inv.swap_rows(i, pivot);

        let diag = work.get(i, i);
        if diag != 1 {
            let scale = galois::inv(diag)?;
            for c in 0..size {
                work.set(i, c, galois::mul(work.get(i, c), scale));
                inv.set(i, c, galois::mul(inv.get(i, c), scale));
            }
        }
        for r in 0..size {
            let t = work.get(r, i);
            if r == i || t == 0 {
                continue;
            }
            for c in 0..size {
                work.set(r, c, galois::add(work.get(r, c), galois::mul(t, work.get(i, c))));
                inv.set(r, c, galois::add(inv.get(r, c), galois::mul(t, inv.get(i, c))));
            }
        }
    }
    Ok(inv)
}
