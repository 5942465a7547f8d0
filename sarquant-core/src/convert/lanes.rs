//! Lane abstraction for the data-parallel encoder.
//!
//! A `Lanes` value is a zero-sized token for one backend. Every operation is
//! strictly lane-wise with IEEE semantics identical to the scalar `f32`/`i32`
//! operator it stands for: no fused multiply-add, no horizontal reductions
//! other than `any`. That is what lets `unseq` reproduce the scalar encoder
//! bit for bit.

use crate::amplitude_table::AMPLITUDE_TABLE_SIZE;

/// Widest backend in use. Scratch buffers in `unseq` are sized to this.
pub const MAX_LANES: usize = 16;

pub trait Lanes: Copy {
    const WIDTH: usize;

    /// `WIDTH` x `f32`.
    type F: Copy;
    /// `WIDTH` x `i32`.
    type I: Copy;
    /// Per-lane predicate.
    type M: Copy;

    fn name(self) -> &'static str;

    fn splat_i(self, v: i32) -> Self::I;
    /// `src.len()` must equal `WIDTH`.
    fn load_f(self, src: &[f32]) -> Self::F;
    /// `src.len()` must equal `WIDTH`.
    fn load_i(self, src: &[i32]) -> Self::I;
    /// `dst.len()` must equal `WIDTH`.
    fn store_i(self, v: Self::I, dst: &mut [i32]);

    fn add_f(self, a: Self::F, b: Self::F) -> Self::F;
    fn sub_f(self, a: Self::F, b: Self::F) -> Self::F;
    fn mul_f(self, a: Self::F, b: Self::F) -> Self::F;

    fn add_i(self, a: Self::I, b: Self::I) -> Self::I;
    fn sub_i(self, a: Self::I, b: Self::I) -> Self::I;
    /// `a / 2` for non-negative lanes.
    fn half_i(self, a: Self::I) -> Self::I;

    /// Ordered `a < b`; false when either lane is NaN.
    fn lt_f(self, a: Self::F, b: Self::F) -> Self::M;
    /// Ordered `a <= b`; false when either lane is NaN.
    fn le_f(self, a: Self::F, b: Self::F) -> Self::M;
    fn gt_i(self, a: Self::I, b: Self::I) -> Self::M;
    fn eq_i(self, a: Self::I, b: Self::I) -> Self::M;

    /// `m ? t : f` per lane.
    fn select_i(self, m: Self::M, t: Self::I, f: Self::I) -> Self::I;
    fn any(self, m: Self::M) -> bool;

    /// `table[idx]` per lane. Indices outside `0..256` belong to finished
    /// ("don't care") lanes and read as NaN so every comparison on them fails.
    fn gather(self, table: &[f32; AMPLITUDE_TABLE_SIZE], idx: Self::I) -> Self::F;
}

/// Portable backend: `W` scalar lanes held in plain arrays.
///
/// The compiler is free to auto-vectorize the element loops; it may not
/// change their results.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayLanes<const W: usize>;

impl<const W: usize> Lanes for ArrayLanes<W> {
    const WIDTH: usize = W;
    type F = [f32; W];
    type I = [i32; W];
    type M = [bool; W];

    fn name(self) -> &'static str {
        match W {
            4 => "array-x4",
            8 => "array-x8",
            16 => "array-x16",
            _ => "array",
        }
    }

    #[inline(always)]
    fn splat_i(self, v: i32) -> Self::I {
        [v; W]
    }

    #[inline(always)]
    fn load_f(self, src: &[f32]) -> Self::F {
        std::array::from_fn(|i| src[i])
    }

    #[inline(always)]
    fn load_i(self, src: &[i32]) -> Self::I {
        std::array::from_fn(|i| src[i])
    }

    #[inline(always)]
    fn store_i(self, v: Self::I, dst: &mut [i32]) {
        dst[..W].copy_from_slice(&v);
    }

    #[inline(always)]
    fn add_f(self, a: Self::F, b: Self::F) -> Self::F {
        std::array::from_fn(|i| a[i] + b[i])
    }

    #[inline(always)]
    fn sub_f(self, a: Self::F, b: Self::F) -> Self::F {
        std::array::from_fn(|i| a[i] - b[i])
    }

    #[inline(always)]
    fn mul_f(self, a: Self::F, b: Self::F) -> Self::F {
        std::array::from_fn(|i| a[i] * b[i])
    }

    #[inline(always)]
    fn add_i(self, a: Self::I, b: Self::I) -> Self::I {
        std::array::from_fn(|i| a[i].wrapping_add(b[i]))
    }

    #[inline(always)]
    fn sub_i(self, a: Self::I, b: Self::I) -> Self::I {
        std::array::from_fn(|i| a[i].wrapping_sub(b[i]))
    }

    #[inline(always)]
    fn half_i(self, a: Self::I) -> Self::I {
        std::array::from_fn(|i| a[i] >> 1)
    }

    #[inline(always)]
    fn lt_f(self, a: Self::F, b: Self::F) -> Self::M {
        std::array::from_fn(|i| a[i] < b[i])
    }

    #[inline(always)]
    fn le_f(self, a: Self::F, b: Self::F) -> Self::M {
        std::array::from_fn(|i| a[i] <= b[i])
    }

    #[inline(always)]
    fn gt_i(self, a: Self::I, b: Self::I) -> Self::M {
        std::array::from_fn(|i| a[i] > b[i])
    }

    #[inline(always)]
    fn eq_i(self, a: Self::I, b: Self::I) -> Self::M {
        std::array::from_fn(|i| a[i] == b[i])
    }

    #[inline(always)]
    fn select_i(self, m: Self::M, t: Self::I, f: Self::I) -> Self::I {
        std::array::from_fn(|i| if m[i] { t[i] } else { f[i] })
    }

    #[inline(always)]
    fn any(self, m: Self::M) -> bool {
        m.iter().any(|&b| b)
    }

    #[inline(always)]
    fn gather(self, table: &[f32; AMPLITUDE_TABLE_SIZE], idx: Self::I) -> Self::F {
        std::array::from_fn(|i| match usize::try_from(idx[i]) {
            Ok(k) if k < AMPLITUDE_TABLE_SIZE => table[k],
            _ => f32::NAN,
        })
    }
}

#[cfg(target_arch = "x86_64")]
pub use avx2::Avx2Lanes;

#[cfg(target_arch = "x86_64")]
mod avx2 {
    use super::{Lanes, AMPLITUDE_TABLE_SIZE};
    use std::arch::x86_64::*;

    /// AVX2 backend: 8 lanes in YMM registers.
    ///
    /// Only obtainable through `detect()`, so holding one proves the CPU
    /// supports AVX2 and the intrinsic calls below are sound.
    #[derive(Debug, Clone, Copy)]
    pub struct Avx2Lanes {
        _private: (),
    }

    impl Avx2Lanes {
        pub fn detect() -> Option<Self> {
            if is_x86_feature_detected!("avx2") {
                Some(Self { _private: () })
            } else {
                None
            }
        }
    }

    // SAFETY (all methods): `self` exists only if AVX2 was detected at
    // runtime. Loads/stores are unaligned and bounded by the WIDTH contract.
    impl Lanes for Avx2Lanes {
        const WIDTH: usize = 8;
        type F = __m256;
        type I = __m256i;
        type M = __m256i;

        fn name(self) -> &'static str {
            "avx2"
        }

        #[inline(always)]
        fn splat_i(self, v: i32) -> Self::I {
            unsafe { _mm256_set1_epi32(v) }
        }

        #[inline(always)]
        fn load_f(self, src: &[f32]) -> Self::F {
            assert!(src.len() >= 8);
            unsafe { _mm256_loadu_ps(src.as_ptr()) }
        }

        #[inline(always)]
        fn load_i(self, src: &[i32]) -> Self::I {
            assert!(src.len() >= 8);
            unsafe { _mm256_loadu_si256(src.as_ptr() as *const __m256i) }
        }

        #[inline(always)]
        fn store_i(self, v: Self::I, dst: &mut [i32]) {
            assert!(dst.len() >= 8);
            unsafe { _mm256_storeu_si256(dst.as_mut_ptr() as *mut __m256i, v) }
        }

        #[inline(always)]
        fn add_f(self, a: Self::F, b: Self::F) -> Self::F {
            unsafe { _mm256_add_ps(a, b) }
        }

        #[inline(always)]
        fn sub_f(self, a: Self::F, b: Self::F) -> Self::F {
            unsafe { _mm256_sub_ps(a, b) }
        }

        #[inline(always)]
        fn mul_f(self, a: Self::F, b: Self::F) -> Self::F {
            unsafe { _mm256_mul_ps(a, b) }
        }

        #[inline(always)]
        fn add_i(self, a: Self::I, b: Self::I) -> Self::I {
            unsafe { _mm256_add_epi32(a, b) }
        }

        #[inline(always)]
        fn sub_i(self, a: Self::I, b: Self::I) -> Self::I {
            unsafe { _mm256_sub_epi32(a, b) }
        }

        #[inline(always)]
        fn half_i(self, a: Self::I) -> Self::I {
            unsafe { _mm256_srai_epi32::<1>(a) }
        }

        #[inline(always)]
        fn lt_f(self, a: Self::F, b: Self::F) -> Self::M {
            unsafe { _mm256_castps_si256(_mm256_cmp_ps::<_CMP_LT_OQ>(a, b)) }
        }

        #[inline(always)]
        fn le_f(self, a: Self::F, b: Self::F) -> Self::M {
            unsafe { _mm256_castps_si256(_mm256_cmp_ps::<_CMP_LE_OQ>(a, b)) }
        }

        #[inline(always)]
        fn gt_i(self, a: Self::I, b: Self::I) -> Self::M {
            unsafe { _mm256_cmpgt_epi32(a, b) }
        }

        #[inline(always)]
        fn eq_i(self, a: Self::I, b: Self::I) -> Self::M {
            unsafe { _mm256_cmpeq_epi32(a, b) }
        }

        #[inline(always)]
        fn select_i(self, m: Self::M, t: Self::I, f: Self::I) -> Self::I {
            unsafe { _mm256_blendv_epi8(f, t, m) }
        }

        #[inline(always)]
        fn any(self, m: Self::M) -> bool {
            unsafe { _mm256_movemask_epi8(m) != 0 }
        }

        #[inline(always)]
        fn gather(self, table: &[f32; AMPLITUDE_TABLE_SIZE], idx: Self::I) -> Self::F {
            unsafe {
                let in_range = _mm256_and_si256(
                    _mm256_cmpgt_epi32(idx, _mm256_set1_epi32(-1)),
                    _mm256_cmpgt_epi32(_mm256_set1_epi32(AMPLITUDE_TABLE_SIZE as i32), idx),
                );
                // Masked-off lanes are not read and keep the NaN source value.
                _mm256_mask_i32gather_ps::<4>(
                    _mm256_set1_ps(f32::NAN),
                    table.as_ptr(),
                    idx,
                    _mm256_castsi256_ps(in_range),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> [f32; AMPLITUDE_TABLE_SIZE] {
        std::array::from_fn(|i| i as f32 * 0.5)
    }

    // Exercises one backend against plain scalar arithmetic.
    fn check_backend<L: Lanes>(lanes: L) {
        let w = L::WIDTH;
        let table = ramp();
        let idx: Vec<i32> = (0..w as i32).map(|i| i * 37 - 2).collect();
        let a: Vec<f32> = (0..w).map(|i| i as f32 * 1.25 - 3.0).collect();
        let b: Vec<f32> = (0..w).map(|i| 2.0 - i as f32 * 0.75).collect();

        let vi = lanes.load_i(&idx);
        let va = lanes.load_f(&a);
        let vb = lanes.load_f(&b);

        // gather: out-of-range lanes must fail every comparison.
        let g = lanes.gather(&table, vi);
        let lt = lanes.lt_f(g, lanes.add_f(g, va));
        let picked = lanes.select_i(lt, lanes.splat_i(1), lanes.splat_i(0));
        let mut out = vec![0i32; w];
        lanes.store_i(picked, &mut out);
        for i in 0..w {
            let k = idx[i];
            let expected = if (0..256).contains(&k) {
                let t = table[k as usize];
                (t < t + a[i]) as i32
            } else {
                0
            };
            assert_eq!(out[i], expected, "{} gather lane {}", lanes.name(), i);
        }

        // arithmetic + ordered compares
        let prod = lanes.sub_f(lanes.mul_f(va, vb), va);
        let le = lanes.le_f(prod, vb);
        lanes.store_i(lanes.select_i(le, vi, lanes.splat_i(-7)), &mut out);
        for i in 0..w {
            let p = a[i] * b[i] - a[i];
            assert_eq!(out[i], if p <= b[i] { idx[i] } else { -7 });
        }

        // integer ops
        let counts: Vec<i32> = (0..w as i32).map(|i| i * 3).collect();
        let vc = lanes.load_i(&counts);
        let mixed = lanes.sub_i(lanes.add_i(lanes.half_i(vc), vc), lanes.splat_i(1));
        lanes.store_i(mixed, &mut out);
        for i in 0..w {
            assert_eq!(out[i], counts[i] / 2 + counts[i] - 1);
        }

        assert!(lanes.any(lanes.gt_i(vc, lanes.splat_i(0))));
        assert!(!lanes.any(lanes.gt_i(vc, lanes.splat_i(1_000))));
        assert!(lanes.any(lanes.eq_i(vc, lanes.splat_i(0))));
    }

    #[test]
    fn test_array_backends() {
        check_backend(ArrayLanes::<4>);
        check_backend(ArrayLanes::<8>);
        check_backend(ArrayLanes::<16>);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_avx2_backend() {
        if let Some(lanes) = Avx2Lanes::detect() {
            check_backend(lanes);
        }
    }

    #[test]
    fn test_width_fits_scratch() {
        assert!(ArrayLanes::<16>::WIDTH <= MAX_LANES);
    }
}
