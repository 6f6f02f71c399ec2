/// 32-iteration restoring divider.
///
/// Operands are converted to absolute values when [`start`](Self::start)ed. Each
/// [`tick`](Self::tick) then produces one quotient bit, most significant first, by comparing the
/// shifted divisor against the partial remainder and subtracting when it fits. The unit is busy
/// for exactly 32 ticks regardless of the operands, after which the signs are reapplied:
/// the quotient is negated if exactly one operand was negative (and the divisor is nonzero), the
/// remainder takes the sign of the dividend.
///
/// Division by zero needs no special case: every comparison succeeds, so the quotient comes out as
/// all ones and the partial remainder is never reduced, i.e. equals the dividend.
#[derive(Debug, Clone, Default)]
pub struct Divider {
    /// Partial remainder.
    dividend: u32,
    /// Divisor aligned with the quotient bit currently being produced.
    divisor: u64,
    quotient: u32,
    /// The quotient bit produced by the next tick, zero once done.
    quotient_mask: u32,
    negate_quotient: bool,
    negate_remainder: bool,
}

impl Divider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latches the operands. `signed` selects DIV/REM over DIVU/REMU.
    pub fn start(&mut self, signed: bool, dividend: u32, divisor: u32) {
        let dividend_negative = signed && (dividend as i32) < 0;
        let divisor_negative = signed && (divisor as i32) < 0;
        let dividend_abs = if dividend_negative {
            (dividend as i32).unsigned_abs()
        } else {
            dividend
        };
        let divisor_abs = if divisor_negative {
            (divisor as i32).unsigned_abs()
        } else {
            divisor
        };
        *self = Self {
            dividend: dividend_abs,
            divisor: u64::from(divisor_abs) << 31,
            quotient: 0,
            quotient_mask: 1 << 31,
            negate_quotient: divisor != 0 && (dividend_negative != divisor_negative),
            negate_remainder: dividend_negative,
        };
    }

    /// Returns `true` while quotient bits remain to be produced.
    pub fn busy(&self) -> bool {
        self.quotient_mask != 0
    }

    /// Produces one quotient bit. Does nothing if the divider is idle.
    pub fn tick(&mut self) {
        if self.quotient_mask == 0 {
            return;
        }
        if self.divisor <= u64::from(self.dividend) {
            // The comparison guarantees the divisor fits in 32 bits here.
            self.dividend -= self.divisor as u32;
            self.quotient |= self.quotient_mask;
        }
        self.divisor >>= 1;
        self.quotient_mask >>= 1;
    }

    pub fn quotient(&self) -> u32 {
        if self.negate_quotient {
            self.quotient.wrapping_neg()
        } else {
            self.quotient
        }
    }

    pub fn remainder(&self) -> u32 {
        if self.negate_remainder {
            self.dividend.wrapping_neg()
        } else {
            self.dividend
        }
    }

    /// Abandons any division in progress.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
