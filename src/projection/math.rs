//! Gudermannian function and its inverse.

/// Taylor coefficients of the inverse Gudermannian, odd powers from x^3 up.
pub const GD_INV_COEFFICIENTS: [f64; 16] = [
    1.0 / 6.0,
    1.0 / 24.0,
    61.0 / 5040.0,
    277.0 / 72576.0,
    50521.0 / 39916800.0,
    41581.0 / 95800320.0,
    199360981.0 / 1307674368000.0,
    228135437.0 / 4184557977600.0,
    2404879675441.0 / 121645100408832000.0,
    14814847529501.0 / 2043637686868377600.0,
    69348874393137901.0 / 25852016738884976640000.0,
    238685140977801337.0 / 238634000674323988480000.0,
    4087072509293123892361.0 / 10888869450418352160768000000.0,
    454540704683713199807.0 / 3209350995912777478963200000.0,
    441543893249023104553682821.0 / 8222838654177922817725562880000000.0,
    2088463430347521052196056349.0 / 102181884455970339664616524800000000.0,
];

/// Past this latitude the truncated series drifts by more than 1e-7 and the
/// closed form takes over.
const GD_INV_SERIES_RANGE: f64 = 1.0;

/// Latitude beyond which Mercator textures are clamped.
pub const GD_INV_SERIES_LIMIT: f64 = 1.4835;

/// Mercator y of the series limit, used as a clamp beyond it.
pub const GD_INV_CLAMP: f64 = 3.1309587;

/// Gudermannian: Mercator y to latitude.
#[inline]
pub fn gd(x: f64) -> f64 {
    x.sinh().atan()
}

/// Inverse Gudermannian: latitude to Mercator y. Near the equator this is
/// the power series in Horner form.
#[inline]
pub fn gd_inv(x: f64) -> f64 {
    if x.abs() > GD_INV_SERIES_RANGE {
        return gd_inv_exact(x);
    }
    let x2 = x * x;
    let mut sum = 0.0;
    for c in GD_INV_COEFFICIENTS.iter().rev() {
        sum = x2 * (c + sum);
    }
    x + x * sum
}

/// Closed form inverse Gudermannian.
#[inline]
pub fn gd_inv_exact(x: f64) -> f64 {
    x.tan().asinh()
}
