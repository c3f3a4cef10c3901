use crate::instruction::{Fmt, FpOp};
use crate::trap::Fault;

/// Words in a saved coprocessor frame: 32 registers, the condition flag
/// and the control/status word.
pub const FPU_FRAME_WORDS: usize = 34;

/// Rounding mode held in the low two bits of the fcsr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rounding {
    #[default]
    Nearest = 0,
    Zero = 1,
    Up = 2,
    Down = 3,
}

impl Rounding {
    pub fn from_fcsr(fcsr: u32) -> Result<Self, Fault> {
        match fcsr {
            0 => Ok(Rounding::Nearest),
            1 => Ok(Rounding::Zero),
            2 => Ok(Rounding::Up),
            3 => Ok(Rounding::Down),
            other => Err(Fault::RoundingMode(other)),
        }
    }

    /// Round an arithmetic result. Nearest leaves the value to the host's
    /// own rounding; the directed modes round to an integral value.
    pub fn apply(self, d: f64) -> f64 {
        match self {
            Rounding::Nearest => d,
            Rounding::Zero => d.trunc(),
            Rounding::Up => d.ceil(),
            Rounding::Down => d.floor(),
        }
    }

    /// Convert to a word for CVT.W.
    pub fn to_word(self, d: f64) -> i32 {
        let r = match self {
            Rounding::Nearest => d.round_ties_even(),
            _ => self.apply(d),
        };
        r as i32
    }
}

/// Floating-point coprocessor state.
///
/// Registers are raw words. A single lives in one register; a double spans
/// an even/odd pair with the low word in the even register.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coprocessor {
    pub regs: [u32; 32],
    /// Condition flag set by compares and read by BC1T/BC1F.
    pub fccr: bool,
    fcsr: u32,
    rounding: Rounding,
}

impl Coprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fcsr(&self) -> u32 {
        self.fcsr
    }

    pub fn rounding(&self) -> Rounding {
        self.rounding
    }

    /// Write the control/status register. Only the rounding bits are
    /// implemented; anything else is fatal.
    pub fn set_fcsr(&mut self, value: u32) -> Result<(), Fault> {
        self.rounding = Rounding::from_fcsr(value)?;
        self.fcsr = value;
        Ok(())
    }

    #[inline]
    pub fn word(&self, n: usize) -> u32 {
        self.regs[n & 31]
    }

    #[inline]
    pub fn set_word(&mut self, n: usize, value: u32) {
        self.regs[n & 31] = value;
    }

    pub fn single(&self, n: usize) -> f32 {
        f32::from_bits(self.word(n))
    }

    pub fn set_single(&mut self, n: usize, value: f32) {
        self.set_word(n, value.to_bits());
    }

    pub fn double(&self, n: usize) -> f64 {
        let lo = self.word(n) as u64;
        let hi = self.word(n + 1) as u64;
        f64::from_bits(lo | (hi << 32))
    }

    pub fn set_double(&mut self, n: usize, value: f64) {
        let bits = value.to_bits();
        self.set_word(n, bits as u32);
        self.set_word(n + 1, (bits >> 32) as u32);
    }

    fn operand(&self, fmt: Fmt, n: usize) -> f64 {
        match fmt {
            Fmt::Single => self.single(n) as f64,
            Fmt::Double => self.double(n),
            Fmt::Word => self.word(n) as i32 as f64,
        }
    }

    /// Execute an arithmetic, conversion or compare instruction.
    ///
    /// Arithmetic is done in double precision and rounded into the
    /// operand format; compares only touch the condition flag.
    pub fn execute(&mut self, fmt: Fmt, op: FpOp, fd: usize, fs: usize, ft: usize) {
        let s = self.operand(fmt, fs);
        let t = self.operand(fmt, ft);

        if op.is_arithmetic() {
            let res = match op {
                FpOp::Add => s + t,
                FpOp::Sub => s - t,
                FpOp::Mul => s * t,
                FpOp::Div => s / t,
                FpOp::Abs => {
                    if s >= 0.0 {
                        s
                    } else {
                        -s
                    }
                }
                FpOp::Mov => s,
                _ => -s,
            };
            match fmt {
                Fmt::Single => self.set_single(fd, self.rounding.apply(res) as f32),
                Fmt::Double => self.set_double(fd, self.rounding.apply(res)),
                Fmt::Word => self.set_word(fd, res as i32 as u32),
            }
            return;
        }

        match op {
            FpOp::CvtS => self.set_single(fd, s as f32),
            FpOp::CvtD => self.set_double(fd, s),
            FpOp::CvtW => self.set_word(fd, self.rounding.to_word(s) as u32),
            FpOp::CEq => self.fccr = s == t,
            FpOp::CUlt => self.fccr = s.is_nan() || t.is_nan() || s < t,
            FpOp::CLt => self.fccr = s < t,
            _ => self.fccr = s <= t,
        }
    }

    /// State pushed onto the stack when a signal handler runs.
    pub fn save_frame(&self) -> [u32; FPU_FRAME_WORDS] {
        let mut frame = [0u32; FPU_FRAME_WORDS];
        frame[..32].copy_from_slice(&self.regs);
        frame[32] = self.fccr as u32;
        frame[33] = self.fcsr;
        frame
    }

    pub fn restore_frame(&mut self, frame: &[u32]) -> Result<(), Fault> {
        if frame.len() != FPU_FRAME_WORDS {
            return Err(Fault::Internal(format!(
                "fp frame has {} words, expected {}",
                frame.len(),
                FPU_FRAME_WORDS
            )));
        }
        self.regs.copy_from_slice(&frame[..32]);
        self.fccr = frame[32] != 0;
        self.set_fcsr(frame[33])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_span_register_pairs() {
        let mut fpu = Coprocessor::new();
        fpu.set_double(2, 1.5);
        let bits = 1.5f64.to_bits();
        assert_eq!(fpu.word(2), bits as u32);
        assert_eq!(fpu.word(3), (bits >> 32) as u32);
        assert_eq!(fpu.double(2), 1.5);
    }

    #[test]
    fn arithmetic_and_compare() {
        let mut fpu = Coprocessor::new();
        fpu.set_double(2, 2.5);
        fpu.set_double(4, 1.25);
        fpu.execute(Fmt::Double, FpOp::Sub, 0, 2, 4);
        assert_eq!(fpu.double(0), 1.25);
        fpu.execute(Fmt::Double, FpOp::CLt, 0, 4, 2);
        assert!(fpu.fccr);
        fpu.execute(Fmt::Double, FpOp::CEq, 0, 4, 2);
        assert!(!fpu.fccr);

        fpu.set_single(6, f32::NAN);
        fpu.set_single(7, 1.0);
        fpu.execute(Fmt::Single, FpOp::CUlt, 0, 6, 7);
        assert!(fpu.fccr);
        fpu.execute(Fmt::Single, FpOp::CLt, 0, 6, 7);
        assert!(!fpu.fccr);
    }

    #[test]
    fn rounding_modes() {
        let mut fpu = Coprocessor::new();
        fpu.set_double(2, -2.5);
        for (mode, want) in [(0, -2), (1, -2), (2, -2), (3, -3)] {
            fpu.set_fcsr(mode).unwrap();
            fpu.execute(Fmt::Double, FpOp::CvtW, 0, 2, 0);
            assert_eq!(fpu.word(0) as i32, want, "mode {}", mode);
        }

        fpu.set_fcsr(3).unwrap();
        fpu.set_double(4, 1.0);
        fpu.set_double(6, 0.75);
        fpu.execute(Fmt::Double, FpOp::Add, 0, 4, 6);
        assert_eq!(fpu.double(0), 1.0);

        assert_eq!(fpu.set_fcsr(4), Err(Fault::RoundingMode(4)));
        assert_eq!(fpu.rounding(), Rounding::Down);
    }

    #[test]
    fn word_format_and_conversions() {
        let mut fpu = Coprocessor::new();
        fpu.set_word(0, 7);
        fpu.execute(Fmt::Word, FpOp::CvtD, 2, 0, 0);
        assert_eq!(fpu.double(2), 7.0);
        fpu.execute(Fmt::Double, FpOp::CvtS, 4, 2, 0);
        assert_eq!(fpu.single(4), 7.0);
        fpu.execute(Fmt::Single, FpOp::Neg, 5, 4, 0);
        assert_eq!(fpu.single(5), -7.0);
    }

    #[test]
    fn frame_round_trip() {
        let mut fpu = Coprocessor::new();
        fpu.set_double(10, 3.25);
        fpu.fccr = true;
        fpu.set_fcsr(2).unwrap();
        let frame = fpu.save_frame();

        let mut other = Coprocessor::new();
        other.restore_frame(&frame).unwrap();
        assert_eq!(other, fpu);
    }
}
