//! NIST P-256 (secp256r1) parameters and a portable ECDSA verifier built on
//! 256-bit modular arithmetic.
use alloy_primitives::{B256, U256, uint};

/// Field prime `p`.
pub const P: U256 =
    uint!(0xffffffff00000001000000000000000000000000ffffffffffffffffffffffff_U256);
/// Curve coefficient `a = p - 3`.
pub const A: U256 =
    uint!(0xffffffff00000001000000000000000000000000fffffffffffffffffffffffc_U256);
pub const B: U256 =
    uint!(0x5ac635d8aa3a93e7b3ebbd55769886bc651d06b0cc53b0f63bce3c3e27d2604b_U256);
pub const GX: U256 =
    uint!(0x6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296_U256);
pub const GY: U256 =
    uint!(0x4fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5_U256);
/// Group order `n`.
pub const N: U256 =
    uint!(0xffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551_U256);
/// `n / 2`, the largest low-S value.
pub const HALF_N: U256 =
    uint!(0x7fffffff800000007fffffffffffffffde737d56d38bcf4279dce5617e3192a8_U256);

/// Returns the low-S form of `s`, reduced mod `n` first.
pub fn normalize_s(s: U256) -> U256 {
    let s = s.reduce_mod(N);
    if s > HALF_N { N - s } else { s }
}

pub fn is_valid_scalar(v: U256) -> bool {
    !v.is_zero() && v < N
}

/// `y² = x³ + ax + b` with both coordinates reduced.
pub fn is_on_curve(x: U256, y: U256) -> bool {
    if x >= P || y >= P {
        return false;
    }
    let lhs = y.mul_mod(y, P);
    let x3 = x.mul_mod(x, P).mul_mod(x, P);
    let rhs = x3.add_mod(A.mul_mod(x, P), P).add_mod(B, P);
    lhs == rhs
}

fn sub(a: U256, b: U256) -> U256 {
    // both operands are already reduced
    if a >= b {
        a.wrapping_sub(b)
    } else {
        P.wrapping_sub(b).wrapping_add(a)
    }
}

fn add(a: U256, b: U256) -> U256 {
    a.add_mod(b, P)
}

fn mul(a: U256, b: U256) -> U256 {
    a.mul_mod(b, P)
}

/// Point in Jacobian coordinates, `z == 0` is the point at infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Jacobian {
    x: U256,
    y: U256,
    z: U256,
}

impl Jacobian {
    const INFINITY: Self = Self {
        x: U256::ZERO,
        y: U256::ZERO,
        z: U256::ZERO,
    };

    const fn from_affine(x: U256, y: U256) -> Self {
        Self {
            x,
            y,
            z: U256::from_limbs([1, 0, 0, 0]),
        }
    }

    fn is_infinity(&self) -> bool {
        self.z.is_zero()
    }

    /// dbl-2001-b, valid for `a = -3`.
    fn double(&self) -> Self {
        if self.is_infinity() || self.y.is_zero() {
            return Self::INFINITY;
        }
        let delta = mul(self.z, self.z);
        let gamma = mul(self.y, self.y);
        let beta = mul(self.x, gamma);
        let t = mul(sub(self.x, delta), add(self.x, delta));
        let alpha = add(add(t, t), t);

        let beta4 = add(add(beta, beta), add(beta, beta));
        let beta8 = add(beta4, beta4);
        let x3 = sub(mul(alpha, alpha), beta8);

        let yz = add(self.y, self.z);
        let z3 = sub(sub(mul(yz, yz), gamma), delta);

        let gamma2 = mul(gamma, gamma);
        let gamma2_8 = {
            let g2 = add(gamma2, gamma2);
            let g4 = add(g2, g2);
            add(g4, g4)
        };
        let y3 = sub(mul(alpha, sub(beta4, x3)), gamma2_8);

        Self { x: x3, y: y3, z: z3 }
    }

    /// add-2007-bl.
    fn add(&self, other: &Self) -> Self {
        if self.is_infinity() {
            return *other;
        }
        if other.is_infinity() {
            return *self;
        }
        let z1z1 = mul(self.z, self.z);
        let z2z2 = mul(other.z, other.z);
        let u1 = mul(self.x, z2z2);
        let u2 = mul(other.x, z1z1);
        let s1 = mul(mul(self.y, other.z), z2z2);
        let s2 = mul(mul(other.y, self.z), z1z1);

        let h = sub(u2, u1);
        let r_half = sub(s2, s1);
        if h.is_zero() {
            return if r_half.is_zero() {
                self.double()
            } else {
                Self::INFINITY
            };
        }

        let h2 = add(h, h);
        let i = mul(h2, h2);
        let j = mul(h, i);
        let r = add(r_half, r_half);
        let v = mul(u1, i);

        let x3 = sub(sub(mul(r, r), j), add(v, v));
        let s1j = mul(s1, j);
        let y3 = sub(mul(r, sub(v, x3)), add(s1j, s1j));
        let zz = add(self.z, other.z);
        let z3 = mul(sub(sub(mul(zz, zz), z1z1), z2z2), h);

        Self { x: x3, y: y3, z: z3 }
    }

    fn to_affine(&self) -> Option<(U256, U256)> {
        let z_inv = self.z.inv_mod(P)?;
        let z_inv2 = mul(z_inv, z_inv);
        Some((mul(self.x, z_inv2), mul(self.y, mul(z_inv2, z_inv))))
    }
}

/// `u1·G + u2·Q` using Shamir's trick.
fn double_scalar_mul(u1: U256, u2: U256, q: Jacobian) -> Jacobian {
    let g = Jacobian::from_affine(GX, GY);
    let gq = g.add(&q);
    let mut acc = Jacobian::INFINITY;
    for bit in (0..256).rev() {
        acc = acc.double();
        match (u1.bit(bit), u2.bit(bit)) {
            (true, true) => acc = acc.add(&gq),
            (true, false) => acc = acc.add(&g),
            (false, true) => acc = acc.add(&q),
            (false, false) => {}
        }
    }
    acc
}

/// ECDSA verification over a 32-byte digest. Does not apply low-S rules.
pub fn verify(digest: B256, r: U256, s: U256, x: U256, y: U256) -> bool {
    if !is_valid_scalar(r) || !is_valid_scalar(s) || !is_on_curve(x, y) {
        return false;
    }
    let Some(w) = s.inv_mod(N) else {
        return false;
    };
    let e = U256::from_be_bytes(digest.0);
    let u1 = e.mul_mod(w, N);
    let u2 = r.mul_mod(w, N);

    let point = double_scalar_mul(u1, u2, Jacobian::from_affine(x, y));
    if point.is_infinity() {
        return false;
    }
    point
        .to_affine()
        .is_some_and(|(px, _)| px.reduce_mod(N) == r)
}
