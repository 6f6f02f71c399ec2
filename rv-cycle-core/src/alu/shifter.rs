/// Direction and fill behavior of a shift.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum ShiftKind {
    #[default]
    Left,
    LogicalRight,
    /// Right shift that replicates the original sign bit into the vacated high bits.
    ArithmeticRight,
}

/// Step-wise barrel shifter.
///
/// The operand is latched by [`start`](Self::start) together with the shift amount. Every
/// [`tick`](Self::tick) afterwards shifts the accumulator by one bit and decrements the remaining
/// count, until nothing remains. In two-level mode a tick shifts by four bits at once as long as at
/// least four remain, which is how the faster hardware variant trades area for latency.
#[derive(Debug, Clone, Default)]
pub struct Shifter {
    accumulator: u32,
    remaining: u32,
    kind: ShiftKind,
    two_level: bool,
}

impl Shifter {
    pub fn new(two_level: bool) -> Self {
        Self {
            two_level,
            ..Self::default()
        }
    }

    /// Latches `value` and the low 5 bits of `amount`. A zero amount is complete immediately.
    pub fn start(&mut self, kind: ShiftKind, value: u32, amount: u32) {
        self.kind = kind;
        self.accumulator = value;
        self.remaining = amount & 0x1F;
    }

    /// Returns `true` while shift steps remain.
    pub fn busy(&self) -> bool {
        self.remaining != 0
    }

    /// Performs one shift step. Does nothing if the shifter is idle.
    pub fn tick(&mut self) {
        if self.remaining == 0 {
            return;
        }
        let step = if self.two_level && self.remaining >= 4 {
            4
        } else {
            1
        };
        self.accumulator = match self.kind {
            ShiftKind::Left => self.accumulator << step,
            ShiftKind::LogicalRight => self.accumulator >> step,
            ShiftKind::ArithmeticRight => ((self.accumulator as i32) >> step) as u32,
        };
        self.remaining -= step;
    }

    /// Returns the accumulator. Only meaningful once [`busy`](Self::busy) is `false`.
    pub fn result(&self) -> u32 {
        self.accumulator
    }

    /// Abandons any shift in progress.
    pub fn reset(&mut self) {
        *self = Self::new(self.two_level);
    }
}
