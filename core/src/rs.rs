//! Reed-Solomon over GF(2^8), generator polynomial x^8+x^4+x^3+x^2+1 (0x11D).
//!
//! 16 parity bytes per frame, correcting up to 8 byte errors. Decoding runs
//! Berlekamp-Massey to find the error-locator polynomial, Chien search to
//! locate the error positions, and Forney's algorithm to recover the error
//! magnitudes. See berthub.eu/articles/posts/reed-solomon-for-programmers
//! for the algorithm this follows.

pub const PARITY_LEN: usize = 16;
const FIELD_SIZE: usize = 256;
const PRIMITIVE_POLY: u16 = 0x11D;

struct GaloisField {
    exp: [u8; 512],
    log: [u8; FIELD_SIZE],
}

impl GaloisField {
    fn new() -> Self {
        let mut exp = [0u8; 512];
        let mut log = [0u8; FIELD_SIZE];
        let mut x: u16 = 1;
        for i in 0..255 {
            exp[i] = x as u8;
            log[x as usize] = i as u8;
            x <<= 1;
            if x & 0x100 != 0 {
                x ^= PRIMITIVE_POLY;
            }
        }
        for i in 255..512 {
            exp[i] = exp[i - 255];
        }
        GaloisField { exp, log }
    }

    fn mul(&self, a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        let la = self.log[a as usize] as usize;
        let lb = self.log[b as usize] as usize;
        self.exp[la + lb]
    }

    fn div(&self, a: u8, b: u8) -> u8 {
        assert!(b != 0, "division by zero in GF(256)");
        if a == 0 {
            return 0;
        }
        let la = self.log[a as usize] as i32;
        let lb = self.log[b as usize] as i32;
        self.exp[((la - lb).rem_euclid(255)) as usize]
    }

    fn pow(&self, a: u8, n: i32) -> u8 {
        if a == 0 {
            return 0;
        }
        let la = self.log[a as usize] as i32;
        self.exp[((la * n).rem_euclid(255)) as usize]
    }

    fn inv(&self, a: u8) -> u8 {
        assert!(a != 0, "no inverse for zero in GF(256)");
        self.exp[(255 - self.log[a as usize] as usize) % 255]
    }

    /// Evaluate polynomial (coefficients highest-degree first) at `x`.
    fn poly_eval(&self, poly: &[u8], x: u8) -> u8 {
        let mut result = poly[0];
        for &coeff in &poly[1..] {
            result = self.mul(result, x) ^ coeff;
        }
        result
    }
}

thread_local! {
    static GF: GaloisField = GaloisField::new();
}

fn gf_mul(a: u8, b: u8) -> u8 {
    GF.with(|gf| gf.mul(a, b))
}

fn generator_poly(n_sym: usize) -> Vec<u8> {
    GF.with(|gf| {
        let mut g = vec![1u8];
        for i in 0..n_sym {
            let root = gf.pow(2, i as i32);
            let mut new_g = vec![0u8; g.len() + 1];
            for (j, &coeff) in g.iter().enumerate() {
                new_g[j] ^= coeff;
                new_g[j + 1] ^= gf.mul(coeff, root);
            }
            g = new_g;
        }
        g
    })
}

/// Encode `data` by appending [`PARITY_LEN`] parity bytes computed via
/// polynomial long division against the generator polynomial.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let gen = generator_poly(PARITY_LEN);
    let mut remainder = vec![0u8; PARITY_LEN];

    for &byte in data {
        let factor = byte ^ remainder[0];
        remainder.rotate_left(1);
        *remainder.last_mut().unwrap() = 0;
        for (i, &g) in gen.iter().skip(1).enumerate() {
            remainder[i] ^= gf_mul(g, factor);
        }
    }

    let mut out = Vec::with_capacity(data.len() + PARITY_LEN);
    out.extend_from_slice(data);
    out.extend_from_slice(&remainder);
    out
}

fn syndromes(codeword: &[u8], n_sym: usize) -> Vec<u8> {
    GF.with(|gf| {
        (0..n_sym)
            .map(|i| gf.poly_eval(codeword, gf.pow(2, i as i32)))
            .collect()
    })
}

/// Berlekamp-Massey over the syndrome sequence. Returns the error-locator
/// polynomial (lowest-degree term first, sigma[0] == 1).
fn berlekamp_massey(syndromes: &[u8]) -> Vec<u8> {
    GF.with(|gf| {
        let mut c = vec![1u8];
        let mut b = vec![1u8];
        let mut l = 0usize;
        let mut m = 1i32;
        let mut b_coeff = 1u8;

        for n in 0..syndromes.len() {
            let mut delta = syndromes[n];
            for i in 1..=l {
                if i < c.len() {
                    delta ^= gf.mul(c[i], syndromes[n - i]);
                }
            }

            if delta == 0 {
                m += 1;
            } else if 2 * l <= n {
                let t = c.clone();
                let coeff = gf.div(delta, b_coeff);
                let shift = m as usize;
                if c.len() < b.len() + shift {
                    c.resize(b.len() + shift, 0);
                }
                for (i, &bv) in b.iter().enumerate() {
                    c[i + shift] ^= gf.mul(coeff, bv);
                }
                l = n + 1 - l;
                b = t;
                b_coeff = delta;
                m = 1;
            } else {
                let coeff = gf.div(delta, b_coeff);
                let shift = m as usize;
                if c.len() < b.len() + shift {
                    c.resize(b.len() + shift, 0);
                }
                for (i, &bv) in b.iter().enumerate() {
                    c[i + shift] ^= gf.mul(coeff, bv);
                }
                m += 1;
            }
        }
        c.truncate(l + 1);
        c
    })
}

/// Chien search: find roots of sigma(x) among alpha^-j for each possible
/// error degree j in the codeword. Returns error positions (index from the
/// start of the codeword, 0 = first byte) in ascending order.
fn chien_search(sigma: &[u8], codeword_len: usize) -> Vec<usize> {
    GF.with(|gf| {
        let mut positions = Vec::new();
        for j in 0..codeword_len {
            // error at degree j (0 = last/lowest-degree symbol) has locator
            // root at alpha^-j.
            let x_inv = gf.pow(2, -(j as i32));
            let mut sum = 0u8;
            let mut xn = 1u8;
            for &coeff in sigma {
                sum ^= gf.mul(coeff, xn);
                xn = gf.mul(xn, x_inv);
            }
            if sum == 0 {
                positions.push(codeword_len - 1 - j);
            }
        }
        positions.sort_unstable();
        positions
    })
}

/// Formal derivative of sigma (lowest-degree first): keeps only odd-degree
/// terms, shifted down one degree.
fn formal_derivative(sigma: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, &coeff) in sigma.iter().enumerate().skip(1) {
        if i % 2 == 1 {
            out.push(coeff);
        }
    }
    out
}

/// Forney's algorithm: recover error magnitudes at the given positions.
fn forney(syndromes: &[u8], sigma: &[u8], positions: &[usize], codeword_len: usize) -> Vec<u8> {
    GF.with(|gf| {
        // Error evaluator polynomial Omega = (S(x) * sigma(x)) mod x^(n_sym)
        let n_sym = syndromes.len();
        let mut omega = vec![0u8; n_sym];
        for (i, &s) in syndromes.iter().enumerate() {
            for (j, &sg) in sigma.iter().enumerate() {
                if i + j < n_sym {
                    omega[i + j] ^= gf.mul(s, sg);
                }
            }
        }
        let sigma_deriv = formal_derivative(sigma);

        positions
            .iter()
            .map(|&pos| {
                let i = codeword_len - 1 - pos;
                let x_inv = gf.pow(2, -(i as i32));
                let mut omega_val = 0u8;
                let mut xn = 1u8;
                for &coeff in &omega {
                    omega_val ^= gf.mul(coeff, xn);
                    xn = gf.mul(xn, x_inv);
                }
                let mut deriv_val = 0u8;
                let mut xn = 1u8;
                for &coeff in &sigma_deriv {
                    deriv_val ^= gf.mul(coeff, xn);
                    xn = gf.mul(xn, x_inv);
                }
                if deriv_val == 0 {
                    0
                } else {
                    let x_i = gf.pow(2, i as i32);
                    gf.mul(x_i, gf.div(omega_val, deriv_val))
                }
            })
            .collect()
    })
}

/// Result of decoding: the corrected codeword (still includes the parity
/// bytes) and how many byte errors were fixed.
pub struct Decoded {
    pub data: Vec<u8>,
    pub corrected: usize,
}

/// Decode a codeword of `data.len() - PARITY_LEN` data bytes plus
/// [`PARITY_LEN`] parity bytes, correcting up to 8 byte errors.
pub fn decode(codeword: &[u8]) -> crate::error::Result<Decoded> {
    use crate::error::ModemError;

    if codeword.len() <= PARITY_LEN {
        return Err(ModemError::InvalidFrameSize);
    }

    let synd = syndromes(codeword, PARITY_LEN);
    if synd.iter().all(|&s| s == 0) {
        let data_len = codeword.len() - PARITY_LEN;
        return Ok(Decoded {
            data: codeword[..data_len].to_vec(),
            corrected: 0,
        });
    }

    let sigma = berlekamp_massey(&synd);
    let error_count = sigma.len() - 1;
    if error_count == 0 || error_count > PARITY_LEN / 2 {
        return Err(ModemError::RsUncorrectable);
    }

    let positions = chien_search(&sigma, codeword.len());
    if positions.len() != error_count {
        return Err(ModemError::RsUncorrectable);
    }

    let magnitudes = forney(&synd, &sigma, &positions, codeword.len());

    let mut corrected = codeword.to_vec();
    for (&pos, &mag) in positions.iter().zip(magnitudes.iter()) {
        corrected[pos] ^= mag;
    }

    let post_synd = syndromes(&corrected, PARITY_LEN);
    if !post_synd.iter().all(|&s| s == 0) {
        return Err(ModemError::RsUncorrectable);
    }

    let data_len = corrected.len() - PARITY_LEN;
    Ok(Decoded {
        data: corrected[..data_len].to_vec(),
        corrected: positions.len(),
    })
}
