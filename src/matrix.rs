//! Dense row-major matrices over a coefficient field.

use std::fmt;

use crate::polynomial::{CoeffOps, Polynomial};

#[derive(Clone, Debug, PartialEq)]
pub struct Matrix<C> {
    rows: usize,
    cols: usize,
    data: Vec<C>,
}

impl<C: CoeffOps> Matrix<C> {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![C::zero(); rows * cols],
        }
    }

    pub fn identity(size: usize) -> Self {
        let mut matrix = Matrix::zeros(size, size);
        for i in 0..size {
            matrix.set(i, i, C::one());
        }
        matrix
    }

    /// Build from rows of equal length.
    pub fn from_rows(rows: Vec<Vec<C>>) -> Self {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        debug_assert!(rows.iter().all(|row| row.len() == cols));
        Matrix {
            rows: rows.len(),
            cols,
            data: rows.into_iter().flatten().collect(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    fn idx(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn get(&self, row: usize, col: usize) -> &C {
        &self.data[self.idx(row, col)]
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> &mut C {
        let idx = self.idx(row, col);
        &mut self.data[idx]
    }

    pub fn set(&mut self, row: usize, col: usize, value: C) {
        let idx = self.idx(row, col);
        self.data[idx] = value;
    }

    pub fn row(&self, row: usize) -> &[C] {
        let start = self.idx(row, 0);
        &self.data[start..start + self.cols]
    }

    pub(crate) fn data_mut(&mut self) -> &mut [C] {
        &mut self.data
    }

    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let cols = self.cols;
        let start_a = a * cols;
        let start_b = b * cols;
        for offset in 0..cols {
            self.data.swap(start_a + offset, start_b + offset);
        }
    }

    pub fn map<D: CoeffOps, F: Fn(&C) -> D>(&self, f: F) -> Matrix<D> {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(f).collect(),
        }
    }

    pub fn mul(&self, other: &Matrix<C>) -> Matrix<C> {
        debug_assert_eq!(self.cols, other.rows);
        let mut result: Matrix<C> = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.get(i, k);
                if a.is_zero() {
                    continue;
                }
                for j in 0..other.cols {
                    let b = other.get(k, j);
                    if b.is_zero() {
                        continue;
                    }
                    let cell: &mut C = result.get_mut(i, j);
                    *cell = cell.add(&a.mul(b));
                }
            }
        }
        result
    }

    pub fn mul_vec(&self, vector: &[C]) -> Vec<C> {
        debug_assert_eq!(self.cols, vector.len());
        (0..self.rows)
            .map(|i| {
                self.row(i)
                    .iter()
                    .zip(vector)
                    .filter(|(a, b)| !a.is_zero() && !b.is_zero())
                    .fold(C::zero(), |acc, (a, b)| acc.add(&a.mul(b)))
            })
            .collect()
    }

    pub fn add_diagonal(&self, value: &C) -> Matrix<C> {
        let mut result = self.clone();
        for i in 0..self.rows.min(self.cols) {
            let cell = result.get_mut(i, i);
            *cell = cell.add(value);
        }
        result
    }

    pub fn trace(&self) -> C {
        (0..self.rows.min(self.cols)).fold(C::zero(), |acc, i| acc.add(self.get(i, i)))
    }

    pub fn diagonal(&self) -> Vec<C> {
        (0..self.rows.min(self.cols))
            .map(|i| self.get(i, i).clone())
            .collect()
    }

    /// `det(t·I - self)` by the Faddeev–LeVerrier recursion.
    pub fn characteristic_polynomial(&self) -> Polynomial<C> {
        debug_assert!(self.is_square());
        let n = self.rows;
        let mut coeffs = vec![C::zero(); n + 1];
        coeffs[n] = C::one();
        let mut m = Matrix::zeros(n, n);
        for k in 1..=n {
            m = self.mul(&m).add_diagonal(&coeffs[n + 1 - k]);
            let am = self.mul(&m);
            coeffs[n - k] = am.trace().neg().div(&C::from_integer(k as i64));
        }
        Polynomial::from_coeffs(coeffs)
    }
}

impl<C: CoeffOps + fmt::Display> fmt::Display for Matrix<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.rows {
            let cells: Vec<String> = self.row(i).iter().map(ToString::to_string).collect();
            writeln!(f, "[{}]", cells.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{rational, Rational};
    use crate::polynomial::Poly;

    fn q(n: i64) -> Rational {
        rational(n, 1)
    }

    #[test]
    fn characteristic_polynomial_of_swap() {
        let swap = Matrix::from_rows(vec![vec![q(0), q(1)], vec![q(1), q(0)]]);
        // t^2 - 1
        assert_eq!(
            swap.characteristic_polynomial(),
            Poly::from_coeffs(vec![q(-1), q(0), q(1)])
        );
    }

    #[test]
    fn characteristic_polynomial_of_triangular() {
        let m = Matrix::from_rows(vec![
            vec![q(2), q(0), q(0)],
            vec![q(1), q(3), q(0)],
            vec![q(5), q(1), q(1)],
        ]);
        let expected = Poly::linear(&q(2)) * Poly::linear(&q(3)) * Poly::linear(&q(1));
        assert_eq!(m.characteristic_polynomial(), expected);
    }

    #[test]
    fn matrix_product_skips_zero_entries() {
        let a = Matrix::from_rows(vec![vec![q(1), q(2)], vec![q(0), q(3)]]);
        let b = Matrix::from_rows(vec![vec![q(0), q(1)], vec![q(1), q(0)]]);
        let expected = Matrix::from_rows(vec![vec![q(2), q(1)], vec![q(3), q(0)]]);
        assert_eq!(a.mul(&b), expected);
        assert_eq!(Matrix::<Rational>::identity(2).mul(&a), a);
    }

    #[test]
    fn matrix_vector_product() {
        let m = Matrix::from_rows(vec![vec![q(1), q(2)], vec![q(0), q(3)]]);
        assert_eq!(m.mul_vec(&[q(1), q(1)]), vec![q(3), q(3)]);
    }
}
