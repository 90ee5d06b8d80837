//! The erasure coder.
//!
//! [`ErasureCoder`] owns the parity block of the generator for one `(K, P)`
//! layout and exposes the three operations the record store needs:
//!
//! - [`encode`](ErasureCoder::encode): payload → [`ShardSet`]
//! - [`reconstruct`](ErasureCoder::reconstruct): any `K` shards → data shards
//! - [`decode`](ErasureCoder::decode): [`ShardSet`] → payload, skipping
//!   corrupt shards and retrying past singular selections
//!
//! The coder is immutable after construction and holds no interior state, so
//! one instance can serve every thread.

use tracing::{debug, error, warn};

use super::matrix::{Matrix, MatrixError};
use super::shard::{Shard, ShardSet};
use super::ErasureError;
use crate::config::{MAX_LAYOUT_CHECK_MINORS, MAX_TOTAL_SHARDS};
use crate::field;

/// Erasure coder for a fixed `(data, parity)` layout.
#[derive(Debug, Clone)]
pub struct ErasureCoder {
    data_shards: usize,
    parity_shards: usize,
    parity: Matrix,
}

impl ErasureCoder {
    /// Build a coder for `data_shards` data and `parity_shards` parity shards.
    ///
    /// # Constraints
    ///
    /// - `data_shards >= 1`, `parity_shards >= 1`
    /// - `data_shards + parity_shards <= 255`
    /// - every `K`-subset of generator rows is invertible, which is checked
    ///   through the square minors of the parity block; a layout with more
    ///   than `MAX_LAYOUT_CHECK_MINORS` minors is refused
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self, ErasureError> {
        if data_shards == 0 || parity_shards == 0 || data_shards + parity_shards > MAX_TOTAL_SHARDS
        {
            return Err(ErasureError::InvalidLayout {
                data: data_shards,
                parity: parity_shards,
            });
        }

        let coder = Self {
            data_shards,
            parity_shards,
            parity: Matrix::vandermonde(parity_shards, data_shards),
        };

        let minors = binomial(coder.total_shards(), data_shards).saturating_sub(1);
        if minors > MAX_LAYOUT_CHECK_MINORS {
            return Err(ErasureError::LayoutTooLarge {
                minors,
                max: MAX_LAYOUT_CHECK_MINORS,
            });
        }
        coder.verify_layout()?;
        debug!(
            data_shards,
            parity_shards, minors, "erasure layout verified recoverable"
        );

        Ok(coder)
    }

    /// Build a coder without the layout check.
    #[cfg(test)]
    fn unverified(data_shards: usize, parity_shards: usize) -> Self {
        Self {
            data_shards,
            parity_shards,
            parity: Matrix::vandermonde(parity_shards, data_shards),
        }
    }

    /// `K`.
    pub fn data_shards(&self) -> usize {
        self.data_shards
    }

    /// `N - K`.
    pub fn parity_shards(&self) -> usize {
        self.parity_shards
    }

    /// `N`.
    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// The `(N-K) × K` parity block of the generator.
    pub fn parity_matrix(&self) -> &Matrix {
        &self.parity
    }

    /// Shard size for a payload of `len` bytes.
    pub fn shard_size(&self, len: usize) -> usize {
        len.div_ceil(self.data_shards)
    }

    /// Generator row for shard `index`: a unit row for data shards, a
    /// Vandermonde row for parity shards.
    fn generator_row(&self, index: usize) -> Vec<u8> {
        if index < self.data_shards {
            let mut row = vec![0u8; self.data_shards];
            row[index] = 1;
            row
        } else {
            self.parity.row(index - self.data_shards).to_vec()
        }
    }

    /// Compute parity shards from `K` equal-length data shards.
    ///
    /// `parity[i][j] = XOR over k of matrix[i][k] · data[k][j]`.
    pub fn encode_parity(&self, data: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, ErasureError> {
        if data.len() != self.data_shards {
            return Err(ErasureError::ShardCountMismatch {
                expected: self.data_shards,
                got: data.len(),
            });
        }
        let size = data[0].len();
        for (index, shard) in data.iter().enumerate() {
            if shard.len() != size {
                return Err(ErasureError::ShardLengthMismatch {
                    index,
                    expected: size,
                    got: shard.len(),
                });
            }
        }

        let mut parity = vec![vec![0u8; size]; self.parity_shards];
        for (i, out) in parity.iter_mut().enumerate() {
            let coefficients = self.parity.row(i);
            for (k, shard) in data.iter().enumerate() {
                let coeff = coefficients[k];
                for (dst, &src) in out.iter_mut().zip(shard.iter()) {
                    *dst ^= field::mul(coeff, src);
                }
            }
        }
        Ok(parity)
    }

    /// Split `payload` into `K` zero-padded data shards and append parity.
    pub fn encode(&self, payload: &[u8]) -> Result<ShardSet, ErasureError> {
        let shard_size = self.shard_size(payload.len());
        let mut padded = payload.to_vec();
        padded.resize(shard_size * self.data_shards, 0);

        let data: Vec<Vec<u8>> = if shard_size == 0 {
            vec![Vec::new(); self.data_shards]
        } else {
            padded.chunks(shard_size).map(<[u8]>::to_vec).collect()
        };
        let parity = self.encode_parity(&data)?;

        let shards = data
            .into_iter()
            .chain(parity)
            .enumerate()
            .map(|(index, bytes)| Shard::new(index, bytes))
            .collect();

        Ok(ShardSet {
            data_shards: self.data_shards,
            parity_shards: self.parity_shards,
            shard_size,
            payload_len: payload.len(),
            shards,
        })
    }

    /// Rebuild the `K` data shards from any `K` present shards.
    ///
    /// `shards` is indexed by shard position and must have length `N`. The
    /// lowest `K` present indices are used.
    pub fn reconstruct(&self, shards: &[Option<Vec<u8>>]) -> Result<Vec<Vec<u8>>, ErasureError> {
        let present = self.present_indices(shards)?;
        if present.len() < self.data_shards {
            return Err(ErasureError::InsufficientShards {
                available: present.len(),
                required: self.data_shards,
            });
        }
        self.reconstruct_from(shards, &present[..self.data_shards])
    }

    /// Rebuild the `K` data shards from exactly the shards at `indices`.
    ///
    /// Used to retry with a different `K`-subset after a
    /// [`ErasureError::SingularMatrix`].
    pub fn reconstruct_from(
        &self,
        shards: &[Option<Vec<u8>>],
        indices: &[usize],
    ) -> Result<Vec<Vec<u8>>, ErasureError> {
        if shards.len() != self.total_shards() {
            return Err(ErasureError::ShardCountMismatch {
                expected: self.total_shards(),
                got: shards.len(),
            });
        }
        if indices.len() != self.data_shards {
            return Err(ErasureError::InsufficientShards {
                available: indices.len(),
                required: self.data_shards,
            });
        }

        let mut selected: Vec<&[u8]> = Vec::with_capacity(indices.len());
        for &index in indices {
            match shards.get(index) {
                Some(Some(bytes)) => selected.push(bytes),
                _ => return Err(ErasureError::ShardUnavailable(index)),
            }
        }
        let size = selected[0].len();
        for (&index, bytes) in indices.iter().zip(&selected) {
            if bytes.len() != size {
                return Err(ErasureError::ShardLengthMismatch {
                    index,
                    expected: size,
                    got: bytes.len(),
                });
            }
        }

        // Fast path: every data shard survived.
        if indices.iter().enumerate().all(|(pos, &index)| pos == index) {
            return Ok(selected.iter().map(|b| b.to_vec()).collect());
        }

        let rows = indices.iter().map(|&i| self.generator_row(i)).collect();
        let decode = Matrix::from_rows(rows)?
            .invert()
            .map_err(|e| match e {
                MatrixError::Singular => ErasureError::SingularMatrix {
                    indices: indices.to_vec(),
                },
                other => other.into(),
            })?;

        let mut data = vec![vec![0u8; size]; self.data_shards];
        for (r, out) in data.iter_mut().enumerate() {
            let coefficients = decode.row(r);
            for (k, src) in selected.iter().enumerate() {
                let coeff = coefficients[k];
                if coeff == 0 {
                    continue;
                }
                for (dst, &b) in out.iter_mut().zip(src.iter()) {
                    *dst ^= field::mul(coeff, b);
                }
            }
        }
        Ok(data)
    }

    /// Rebuild all `N` shards, data and parity, from any `K` present shards.
    pub fn reconstruct_all(&self, shards: &[Option<Vec<u8>>]) -> Result<Vec<Vec<u8>>, ErasureError> {
        let data = self.reconstruct_with_fallback(shards)?;
        let parity = self.encode_parity(&data)?;
        Ok(data.into_iter().chain(parity).collect())
    }

    /// Recover the original payload from a shard set.
    ///
    /// Corrupt shards are excluded by digest before decoding. If the first
    /// `K`-subset is singular, the remaining subsets of intact shards are
    /// tried in lexicographic order.
    pub fn decode(&self, set: &ShardSet) -> Result<Vec<u8>, ErasureError> {
        self.check_geometry(set)?;
        let corrupt = set.corrupt_indices();
        if !corrupt.is_empty() {
            warn!(?corrupt, "corrupt shards excluded from decode");
        }

        let verified = set.verified();
        let data = self.reconstruct_with_fallback(&verified)?;

        let mut payload = Vec::with_capacity(set.shard_size * self.data_shards);
        for shard in data {
            payload.extend_from_slice(&shard);
        }
        payload.truncate(set.payload_len);
        Ok(payload)
    }

    fn reconstruct_with_fallback(
        &self,
        shards: &[Option<Vec<u8>>],
    ) -> Result<Vec<Vec<u8>>, ErasureError> {
        let present = self.present_indices(shards)?;
        if present.len() < self.data_shards {
            return Err(ErasureError::InsufficientShards {
                available: present.len(),
                required: self.data_shards,
            });
        }

        let mut last_singular = None;
        for positions in Combinations::new(present.len(), self.data_shards) {
            let indices: Vec<usize> = positions.iter().map(|&p| present[p]).collect();
            match self.reconstruct_from(shards, &indices) {
                Err(ErasureError::SingularMatrix { indices }) => {
                    error!(?indices, "singular reconstruction matrix; trying next subset");
                    last_singular = Some(indices);
                }
                other => return other,
            }
        }
        Err(ErasureError::SingularMatrix {
            indices: last_singular.unwrap_or_default(),
        })
    }

    fn present_indices(&self, shards: &[Option<Vec<u8>>]) -> Result<Vec<usize>, ErasureError> {
        if shards.len() != self.total_shards() {
            return Err(ErasureError::ShardCountMismatch {
                expected: self.total_shards(),
                got: shards.len(),
            });
        }
        Ok(shards
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| i)
            .collect())
    }

    fn check_geometry(&self, set: &ShardSet) -> Result<(), ErasureError> {
        if set.data_shards != self.data_shards || set.parity_shards != self.parity_shards {
            return Err(ErasureError::InvalidLayout {
                data: set.data_shards,
                parity: set.parity_shards,
            });
        }
        if set.shards.len() != self.total_shards() {
            return Err(ErasureError::ShardCountMismatch {
                expected: self.total_shards(),
                got: set.shards.len(),
            });
        }
        Ok(())
    }

    /// Check that every `K`-subset of the `N` generator rows is invertible.
    ///
    /// A subset keeping data shards `D` and parity rows `R` is invertible
    /// exactly when the minor of the parity block on rows `R` and the
    /// missing data columns is. Minors are walked by size, then rows, then
    /// columns; the first singular one is reported as the shard subset it
    /// blocks.
    pub fn verify_layout(&self) -> Result<(), ErasureError> {
        let k = self.data_shards;
        for size in 1..=k.min(self.parity_shards) {
            for rows in Combinations::new(self.parity_shards, size) {
                for cols in Combinations::new(k, size) {
                    let minor = rows
                        .iter()
                        .map(|&r| cols.iter().map(|&c| self.parity.get(r, c)).collect())
                        .collect();
                    match Matrix::from_rows(minor)?.invert() {
                        Ok(_) => {}
                        Err(MatrixError::Singular) => {
                            let mut indices: Vec<usize> =
                                (0..k).filter(|c| !cols.contains(c)).collect();
                            indices.extend(rows.iter().map(|&r| k + r));
                            indices.sort_unstable();
                            return Err(ErasureError::UnrecoverableLayout { indices });
                        }
                        Err(other) => return Err(other.into()),
                    }
                }
            }
        }
        Ok(())
    }
}

/// `k`-combinations of `0..n` in lexicographic order.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    current: Option<Vec<usize>>,
}

impl Combinations {
    /// Iterate every `k`-subset of `0..n`. Yields nothing when `k > n`.
    pub fn new(n: usize, k: usize) -> Self {
        let current = if k <= n { Some((0..k).collect()) } else { None };
        Self { n, current }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let out = self.current.take()?;
        let k = out.len();
        let mut next = out.clone();
        // Rightmost position that can still move right.
        let mut i = k;
        while i > 0 {
            i -= 1;
            if next[i] < self.n - k + i {
                next[i] += 1;
                for j in i + 1..k {
                    next[j] = next[j - 1] + 1;
                }
                self.current = Some(next);
                return Some(out);
            }
        }
        Some(out)
    }
}

/// `C(n, k)`, saturating.
fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: usize = 1;
    for i in 0..k {
        acc = acc.saturating_mul(n - i) / (i + 1);
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 + 7) as u8).collect()
    }

    fn drop_shards(set: &ShardSet, missing: &[usize]) -> Vec<Option<Vec<u8>>> {
        set.shards
            .iter()
            .map(|s| {
                if missing.contains(&s.index) {
                    None
                } else {
                    s.bytes.clone()
                }
            })
            .collect()
    }

    #[test]
    fn combinations_enumerate_in_order() {
        let all: Vec<Vec<usize>> = Combinations::new(4, 2).collect();
        assert_eq!(
            all,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert_eq!(Combinations::new(6, 4).count(), 15);
        assert_eq!(Combinations::new(2, 3).count(), 0);
        assert_eq!(Combinations::new(3, 0).count(), 1);
    }

    #[test]
    fn binomial_values() {
        assert_eq!(binomial(6, 4), 15);
        assert_eq!(binomial(10, 0), 1);
        assert_eq!(binomial(3, 5), 0);
        assert_eq!(binomial(14, 10), 1001);
    }

    #[test]
    fn four_plus_two_layout_is_recoverable_from_every_subset() {
        let coder = ErasureCoder::new(4, 2).unwrap();
        assert!(coder.verify_layout().is_ok());
    }

    #[test]
    fn invalid_layouts_are_rejected() {
        assert!(matches!(
            ErasureCoder::new(0, 2),
            Err(ErasureError::InvalidLayout { .. })
        ));
        assert!(matches!(
            ErasureCoder::new(4, 0),
            Err(ErasureError::InvalidLayout { .. })
        ));
        assert!(matches!(
            ErasureCoder::new(200, 56),
            Err(ErasureError::InvalidLayout { .. })
        ));
    }

    #[test]
    fn five_plus_six_layout_is_rejected() {
        // Parity rows {0, 2, 5} restricted to data columns {0, 3, 4} form a
        // singular minor, so not every 5-subset of the 11 shards can rebuild.
        assert_eq!(
            ErasureCoder::new(5, 6).unwrap_err(),
            ErasureError::UnrecoverableLayout {
                indices: vec![1, 2, 5, 7, 10]
            }
        );
    }

    #[test]
    fn wide_parity_layouts_with_singular_minors_are_rejected() {
        // Parity rows {0, 1, 4} on data columns {0, 3, 5} are singular.
        assert_eq!(
            ErasureCoder::new(10, 6).unwrap_err(),
            ErasureError::UnrecoverableLayout {
                indices: vec![1, 2, 4, 6, 7, 8, 9, 10, 11, 14]
            }
        );
        assert!(matches!(
            ErasureCoder::new(9, 7),
            Err(ErasureError::UnrecoverableLayout { .. })
        ));
    }

    #[test]
    fn reported_subset_really_cannot_decode() {
        let coder = ErasureCoder::unverified(10, 6);
        let indices = match coder.verify_layout() {
            Err(ErasureError::UnrecoverableLayout { indices }) => indices,
            other => panic!("expected an unrecoverable layout, got {other:?}"),
        };
        let set = coder.encode(&payload(100)).unwrap();
        let all: Vec<Option<Vec<u8>>> = set.shards.iter().map(|s| s.bytes.clone()).collect();
        assert_eq!(
            coder.reconstruct_from(&all, &indices),
            Err(ErasureError::SingularMatrix { indices })
        );
    }

    #[test]
    fn minor_check_agrees_with_every_subset() {
        for (k, p) in [(4, 2), (5, 3), (8, 4), (5, 6), (10, 6)] {
            let coder = ErasureCoder::unverified(k, p);
            let set = coder.encode(&payload(k * 3)).unwrap();
            let all: Vec<Option<Vec<u8>>> = set.shards.iter().map(|s| s.bytes.clone()).collect();
            let singular = Combinations::new(k + p, k)
                .filter(|indices| coder.reconstruct_from(&all, indices).is_err())
                .count();
            assert_eq!(coder.verify_layout().is_ok(), singular == 0, "{k}+{p}");
        }
    }

    #[test]
    fn layouts_too_large_to_check_are_refused() {
        assert_eq!(
            ErasureCoder::new(12, 8).unwrap_err(),
            ErasureError::LayoutTooLarge {
                minors: 125_969,
                max: MAX_LAYOUT_CHECK_MINORS
            }
        );
    }

    #[test]
    fn singular_selection_is_reported_with_its_indices() {
        let coder = ErasureCoder::unverified(5, 6);
        let mut set = coder.encode(&payload(50)).unwrap();
        for index in [0, 3, 4, 6, 8, 9] {
            set.mark_missing(index);
        }
        assert_eq!(
            coder.decode(&set),
            Err(ErasureError::SingularMatrix {
                indices: vec![1, 2, 5, 7, 10]
            })
        );
    }

    #[test]
    fn encode_is_deterministic() {
        let coder = ErasureCoder::new(4, 2).unwrap();
        let a = coder.encode(&payload(64)).unwrap();
        let b = coder.encode(&payload(64)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.shard_size, 16);
        assert_eq!(a.shards.len(), 6);
    }

    #[test]
    fn first_parity_row_is_plain_xor() {
        let coder = ErasureCoder::new(3, 2).unwrap();
        let data = vec![vec![1u8, 2], vec![4, 8], vec![16, 32]];
        let parity = coder.encode_parity(&data).unwrap();
        assert_eq!(parity[0], vec![1 ^ 4 ^ 16, 2 ^ 8 ^ 32]);
    }

    #[test]
    fn every_four_subset_of_six_rebuilds_the_data() {
        let coder = ErasureCoder::new(4, 2).unwrap();
        let original = payload(64);
        let set = coder.encode(&original).unwrap();
        let expected: Vec<Vec<u8>> = set.shards[..4]
            .iter()
            .map(|s| s.bytes.clone().unwrap())
            .collect();

        let all: Vec<Option<Vec<u8>>> = set.shards.iter().map(|s| s.bytes.clone()).collect();
        for indices in Combinations::new(6, 4) {
            let data = coder.reconstruct_from(&all, &indices).unwrap();
            assert_eq!(data, expected, "subset {indices:?}");
        }
    }

    #[test]
    fn decode_truncates_padding() {
        let coder = ErasureCoder::new(4, 2).unwrap();
        for len in [0usize, 1, 3, 5, 63, 65, 100] {
            let original = payload(len);
            let set = coder.encode(&original).unwrap();
            assert_eq!(coder.decode(&set).unwrap(), original, "len {len}");
        }
    }

    #[test]
    fn k_minus_one_shards_fail_and_k_succeed() {
        let coder = ErasureCoder::new(4, 2).unwrap();
        let set = coder.encode(&payload(40)).unwrap();

        let three = drop_shards(&set, &[0, 2, 5]);
        assert_eq!(
            coder.reconstruct(&three),
            Err(ErasureError::InsufficientShards {
                available: 3,
                required: 4
            })
        );

        let four = drop_shards(&set, &[1, 4]);
        assert!(coder.reconstruct(&four).is_ok());
    }

    #[test]
    fn reconstruct_all_restores_parity() {
        let coder = ErasureCoder::new(4, 2).unwrap();
        let set = coder.encode(&payload(33)).unwrap();
        let damaged = drop_shards(&set, &[0, 5]);
        let rebuilt = coder.reconstruct_all(&damaged).unwrap();
        for shard in &set.shards {
            assert_eq!(Some(&rebuilt[shard.index]), shard.bytes.as_ref());
        }
    }

    #[test]
    fn decode_skips_tampered_shards() {
        let coder = ErasureCoder::new(4, 2).unwrap();
        let original = payload(64);
        let mut set = coder.encode(&original).unwrap();
        if let Some(bytes) = set.shards[2].bytes.as_mut() {
            for b in bytes.iter_mut() {
                *b = !*b;
            }
        }
        assert_eq!(coder.decode(&set).unwrap(), original);

        set.shards[0].mark_missing();
        set.shards[1].mark_missing();
        assert!(matches!(
            coder.decode(&set),
            Err(ErasureError::InsufficientShards {
                available: 3,
                required: 4
            })
        ));
    }

    #[test]
    fn mismatched_shard_lengths_are_rejected() {
        let coder = ErasureCoder::new(2, 1).unwrap();
        let err = coder.encode_parity(&[vec![1, 2], vec![3]]).unwrap_err();
        assert!(matches!(err, ErasureError::ShardLengthMismatch { index: 1, .. }));
    }

    #[test]
    fn wider_layouts_round_trip() {
        for (k, p) in [(1usize, 1usize), (2, 3), (5, 3), (8, 4)] {
            let coder = ErasureCoder::new(k, p).unwrap();
            let original = payload(97);
            let set = coder.encode(&original).unwrap();
            let lost: Vec<usize> = (0..p).map(|i| i * 2 % (k + p)).collect();
            let mut damaged = set.clone();
            for i in lost {
                damaged.mark_missing(i);
            }
            assert_eq!(coder.decode(&damaged).unwrap(), original, "({k},{p})");
        }
    }
}
