//! MOS 6510 interpreter.
//!
//! Whole instructions retire atomically; the cycle budget the clock
//! grants per raster line is drawn down by each instruction's documented
//! cost, with the deficit carried into the next line. The two interrupt
//! lines are polled at instruction boundaries, so a request raised during
//! cycle N is accepted before cycle N+1 begins.

pub mod instr;

use crate::interrupt::InterruptLine;
use crate::mem::MemoryBus;
use crate::utils::R2C;
use instr::{decode_instr, Addr, AddrCalcVars, Instr, Op};
use std::fmt::{self, Display, Formatter};

const STACK_BOTTOM: u16 = 0x0100;
pub const RESET_VECTOR: u16 = 0xfffc;
pub const IRQ_VECTOR: u16 = 0xfffe;
pub const NMI_VECTOR: u16 = 0xfffa;

/// Every accepted IRQ/NMI costs this much.
const INTERRUPT_CYCLES: isize = 7;
/// Reset seeds the budget with the cost of the reset sequence.
const RESET_CYCLE_CREDIT: isize = 6;

// https://www.c64-wiki.com/wiki/Processor_Status_Register
bitflags! {
    #[derive(Default)]
    pub struct Flags: u8 {
        const CARRY  = 0b0000_0001;
        const ZERO   = 0b0000_0010;
        const IRQD   = 0b0000_0100;
        const DEC    = 0b0000_1000;
        const BRK    = 0b0001_0000;
        const UNUSED = 0b0010_0000;
        const OVFL   = 0b0100_0000;
        const NEG    = 0b1000_0000;
    }
}

impl Display for Flags {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        macro_rules! flag {
            ($flag:expr, $ch:literal) => {
                let ch = if self.contains($flag) {
                    $ch.to_uppercase().to_string()
                } else {
                    $ch.to_lowercase().to_string()
                };
                write!(formatter, "{}", ch)?;
            };
        }
        flag!(Flags::NEG, 'N');
        flag!(Flags::OVFL, 'V');
        flag!(Flags::UNUSED, 'U');
        flag!(Flags::BRK, 'B');
        flag!(Flags::DEC, 'D');
        flag!(Flags::IRQD, 'I');
        flag!(Flags::ZERO, 'Z');
        flag!(Flags::CARRY, 'C');
        fmt::Result::Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Regs {
    pub pc: u16,
    pub sp: u8,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub p: Flags,
}

impl Display for Regs {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        let Regs { pc, sp, a, x, y, p } = &self;
        write!(formatter, "PC:{:04x} SP:{:02x} A:{:02x} X:{:02x} Y:{:02x} P:{}", pc, sp, a, x, y, p)
    }
}

impl Regs {
    #[inline]
    fn sp_abs(&self) -> u16 {
        STACK_BOTTOM + (self.sp as u16)
    }

    /// P as pushed/read externally: the constant bit is always 1.
    pub fn p_ext(&self) -> u8 {
        (self.p | Flags::UNUSED).bits()
    }

    #[inline]
    fn set_nz(&mut self, v: u8) {
        self.p.set(Flags::NEG, v & 0x80 != 0);
        self.p.set(Flags::ZERO, v == 0);
    }

    #[inline]
    fn lda(&mut self, v: u8) {
        self.a = v;
        self.set_nz(v);
    }

    #[inline]
    fn ldx(&mut self, v: u8) {
        self.x = v;
        self.set_nz(v);
    }

    #[inline]
    fn ldy(&mut self, v: u8) {
        self.y = v;
        self.set_nz(v);
    }

    /// CMP/CPX/CPY: C if register >= operand, N and Z from the wrapping
    /// difference. The carry flag does not participate.
    #[inline]
    fn compare(&mut self, reg: u8, v: u8) {
        self.p.set(Flags::CARRY, reg >= v);
        self.set_nz(reg.wrapping_sub(v));
    }
}

pub struct MOS6510 {
    mem: R2C<MemoryBus>,
    reg: Regs,
    cycles_remaining: isize,
    irq: InterruptLine,
    nmi: InterruptLine,
}

impl MOS6510 {
    pub fn new(mem: R2C<MemoryBus>, irq: InterruptLine, nmi: InterruptLine) -> Self {
        MOS6510 { mem, reg: Regs::default(), cycles_remaining: 0, irq, nmi }
    }

    pub fn reg(&self) -> &Regs {
        &self.reg
    }

    pub fn pc(&self) -> u16 {
        self.reg.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.reg.pc = pc;
    }

    /// All registers to zero, PC from the reset vector, and a cycle
    /// credit covering the reset sequence. (Real silicon leaves SP at
    /// 0xFD after three phantom pulls; the KERNAL initializes SP itself
    /// before relying on it, so plain zero serves.)
    pub fn reset(&mut self) {
        self.reg = Regs::default();
        self.reg.pc = self.mem.borrow().read_word(RESET_VECTOR);
        self.cycles_remaining = RESET_CYCLE_CREDIT;
    }

    /// Grant a cycle budget and retire instructions until it is spent.
    /// An instruction may overshoot; the deficit carries into the next
    /// grant.
    pub fn feed_cycles(&mut self, budget: usize) {
        self.cycles_remaining += budget as isize;
        while self.cycles_remaining > 0 {
            self.step_instruction();
        }
    }

    /// Service pending interrupts, then fetch/decode/execute one
    /// instruction. Public so test harnesses can single-step without a
    /// clock.
    pub fn step_instruction(&mut self) {
        if self.nmi.take() {
            self.interrupt(NMI_VECTOR);
            return;
        }
        if !self.reg.p.contains(Flags::IRQD) && self.irq.take() {
            self.interrupt(IRQ_VECTOR);
            return;
        }

        let mut instrbuf = [0u8; 3];
        {
            let mem = self.mem.borrow();
            for (i, b) in instrbuf.iter_mut().enumerate() {
                *b = mem.read(self.reg.pc.wrapping_add(i as u16));
            }
        }
        let (instr, len) = match decode_instr(&instrbuf) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::error!("unmapped opcode at {}: {:?}", self.reg, e);
                panic!("unmapped opcode at pc={:#06x}: {:?}", self.reg.pc, e);
            }
        };
        let next_pc = self.reg.pc.wrapping_add(len as u16);
        let cycles = self.execute(instr, next_pc);
        self.cycles_remaining -= cycles as isize;
    }

    /// Hardware interrupt entry: stack PC and P (B clear), mask further
    /// IRQs, jump through the vector.
    fn interrupt(&mut self, vector: u16) {
        self.push((self.reg.pc >> 8) as u8);
        self.push(self.reg.pc as u8);
        self.push((self.reg.p & !Flags::BRK | Flags::UNUSED).bits());
        self.reg.p.insert(Flags::IRQD);
        self.reg.pc = self.mem.borrow().read_word(vector);
        self.cycles_remaining -= INTERRUPT_CYCLES;
    }

    fn read(&self, addr: u16) -> u8 {
        self.mem.borrow().read(addr)
    }

    fn read_word(&self, addr: u16) -> u16 {
        self.mem.borrow().read_word(addr)
    }

    /// 16-bit pointer fetch that wraps within the zero page, as the
    /// indexed-indirect modes do.
    fn read_zp_word(&self, zp: u8) -> u16 {
        let lo = self.read(zp as u16);
        let hi = self.read(zp.wrapping_add(1) as u16);
        u16::from_le_bytes([lo, hi])
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.mem.borrow_mut().write(addr, val);
    }

    fn push(&mut self, v: u8) {
        self.mem.borrow_mut().write(self.reg.sp_abs(), v);
        self.reg.sp = self.reg.sp.wrapping_sub(1);
    }

    fn pull(&mut self) -> u8 {
        self.reg.sp = self.reg.sp.wrapping_add(1);
        self.mem.borrow().read(self.reg.sp_abs())
    }

    /// Execute one decoded instruction; returns its cycle cost.
    fn execute(&mut self, instr: Instr, next_pc: u16) -> usize {
        use Addr::*;
        use Op::*;

        let Instr(op, addr) = instr;

        let acv: Option<AddrCalcVars> = match addr {
            Imp | Acc | Imm(_) => None,
            Zpi(v) => Some(AddrCalcVars::same(v as u16)),
            // zero-page indexing wraps within the page
            ZpX(v) => Some(AddrCalcVars::same(v.wrapping_add(self.reg.x) as u16)),
            ZpY(v) => Some(AddrCalcVars::same(v.wrapping_add(self.reg.y) as u16)),
            // branch target: signed displacement from the post-fetch PC
            PCr(o) => {
                Some(AddrCalcVars { base: next_pc, effective: next_pc.wrapping_add(o as u16) })
            }
            Abs(v) => Some(AddrCalcVars::same(v)),
            AbX(v) => Some(AddrCalcVars { base: v, effective: v.wrapping_add(self.reg.x as u16) }),
            AbY(v) => Some(AddrCalcVars { base: v, effective: v.wrapping_add(self.reg.y as u16) }),
            // no page-wrap bug here: the pointer bytes are read
            // consecutively even across a page boundary
            Ind(v) => Some(AddrCalcVars::same(self.read_word(v))),
            IzX(zp) => Some(AddrCalcVars::same(self.read_zp_word(zp.wrapping_add(self.reg.x)))),
            IzY(zp) => {
                let base = self.read_zp_word(zp);
                Some(AddrCalcVars { base, effective: base.wrapping_add(self.reg.y as u16) })
            }
        };
        let ea = acv.map(|a| a.effective);

        // operand fetch for instructions that read their operand
        macro_rules! operand {
            () => {
                match addr {
                    Imm(v) => v,
                    Acc => self.reg.a,
                    _ => self.read(ea.unwrap()),
                }
            };
        }

        macro_rules! branch {
            ($flag:tt == $expected:expr) => {{
                if self.reg.p.contains(Flags::$flag) == ($expected != 0) {
                    Some(ea.unwrap())
                } else {
                    None
                }
            }};
        }

        let mut jump: Option<u16> = None;
        match op {
            /***************** Load/Store Operations ******************/
            LDA => {
                let v = operand!();
                self.reg.lda(v);
            }
            LDX => {
                let v = operand!();
                self.reg.ldx(v);
            }
            LDY => {
                let v = operand!();
                self.reg.ldy(v);
            }
            STA => self.write(ea.unwrap(), self.reg.a),
            STX => self.write(ea.unwrap(), self.reg.x),
            STY => self.write(ea.unwrap(), self.reg.y),

            /***************** Register Transfers ******************/
            TAX => self.reg.ldx(self.reg.a),
            TAY => self.reg.ldy(self.reg.a),
            TXA => self.reg.lda(self.reg.x),
            TYA => self.reg.lda(self.reg.y),

            /***************** Stack Operations ******************/
            TSX => self.reg.ldx(self.reg.sp),
            TXS => self.reg.sp = self.reg.x, // no flags
            PHA => self.push(self.reg.a),
            // PHP pushes with B set, like BRK does
            PHP => self.push((self.reg.p | Flags::BRK | Flags::UNUSED).bits()),
            PLA => {
                let v = self.pull();
                self.reg.lda(v);
            }
            // the stacked byte's B bit is a push artifact; the live
            // register keeps B clear and the constant bit set
            PLP => {
                let v = self.pull();
                self.reg.p = Flags::from_bits_truncate(v) & !Flags::BRK | Flags::UNUSED;
            }

            /***************** Logical ******************/
            AND => {
                let v = operand!();
                self.reg.lda(self.reg.a & v);
            }
            EOR => {
                let v = operand!();
                self.reg.lda(self.reg.a ^ v);
            }
            ORA => {
                let v = operand!();
                self.reg.lda(self.reg.a | v);
            }
            // BIT: N and V straight from operand bits 7/6, Z from the AND
            BIT => {
                let v = operand!();
                self.reg.p.set(Flags::NEG, v & 0x80 != 0);
                self.reg.p.set(Flags::OVFL, v & 0x40 != 0);
                self.reg.p.set(Flags::ZERO, v & self.reg.a == 0);
            }

            /***************** Arithmetic ******************/
            ADC => {
                let v = operand!();
                self.adc(v);
            }
            SBC => {
                let v = operand!();
                self.sbc(v);
            }
            CMP => {
                let v = operand!();
                self.reg.compare(self.reg.a, v);
            }
            CPX => {
                let v = operand!();
                self.reg.compare(self.reg.x, v);
            }
            CPY => {
                let v = operand!();
                self.reg.compare(self.reg.y, v);
            }

            /***************** Increments & Decrements ******************/
            INC => {
                let v = self.read(ea.unwrap()).wrapping_add(1);
                self.write(ea.unwrap(), v);
                self.reg.set_nz(v);
            }
            DEC => {
                let v = self.read(ea.unwrap()).wrapping_sub(1);
                self.write(ea.unwrap(), v);
                self.reg.set_nz(v);
            }
            INX => self.reg.ldx(self.reg.x.wrapping_add(1)),
            INY => self.reg.ldy(self.reg.y.wrapping_add(1)),
            DEX => self.reg.ldx(self.reg.x.wrapping_sub(1)),
            DEY => self.reg.ldy(self.reg.y.wrapping_sub(1)),

            /***************** Shifts ******************/
            ASL | LSR | ROL | ROR => {
                let v = match addr {
                    Acc => self.reg.a,
                    _ => self.read(ea.unwrap()),
                };
                let carry_in = self.reg.p.contains(Flags::CARRY) as u8;
                let (res, carry_out) = match op {
                    ASL => (v << 1, v & 0x80 != 0),
                    LSR => (v >> 1, v & 0x01 != 0),
                    ROL => ((v << 1) | carry_in, v & 0x80 != 0),
                    ROR => ((v >> 1) | (carry_in << 7), v & 0x01 != 0),
                    _ => unreachable!(),
                };
                self.reg.set_nz(res);
                self.reg.p.set(Flags::CARRY, carry_out);
                match addr {
                    Acc => self.reg.a = res,
                    _ => self.write(ea.unwrap(), res),
                }
            }

            /***************** Jumps & Calls ******************/
            JMP => jump = Some(ea.unwrap()),
            // pushes the address of the instruction's last byte; RTS
            // undoes the off-by-one
            JSR => {
                let ret = next_pc.wrapping_sub(1);
                self.push((ret >> 8) as u8);
                self.push(ret as u8);
                jump = Some(ea.unwrap());
            }
            RTS => {
                let lo = self.pull();
                let hi = self.pull();
                jump = Some(u16::from_le_bytes([lo, hi]).wrapping_add(1));
            }

            /***************** Branches ******************/
            BCC => jump = branch!(CARRY == 0),
            BCS => jump = branch!(CARRY == 1),
            BEQ => jump = branch!(ZERO == 1),
            BMI => jump = branch!(NEG == 1),
            BNE => jump = branch!(ZERO == 0),
            BPL => jump = branch!(NEG == 0),
            BVC => jump = branch!(OVFL == 0),
            BVS => jump = branch!(OVFL == 1),

            /***************** Status Flag Changes ******************/
            CLC => self.reg.p.remove(Flags::CARRY),
            CLD => self.reg.p.remove(Flags::DEC),
            CLI => self.reg.p.remove(Flags::IRQD),
            CLV => self.reg.p.remove(Flags::OVFL),
            SEC => self.reg.p.insert(Flags::CARRY),
            SED => self.reg.p.insert(Flags::DEC),
            SEI => self.reg.p.insert(Flags::IRQD),

            /***************** System Functions ******************/
            // BRK stacks PC+2 (one past its padding byte) and P with B
            // set, then takes the IRQ vector with I masked
            BRK => {
                let ret = next_pc.wrapping_add(1);
                self.push((ret >> 8) as u8);
                self.push(ret as u8);
                self.push((self.reg.p | Flags::BRK | Flags::UNUSED).bits());
                self.reg.p.insert(Flags::IRQD);
                jump = Some(self.read_word(IRQ_VECTOR));
            }
            RTI => {
                let p = self.pull();
                self.reg.p = Flags::from_bits_truncate(p) & !Flags::BRK | Flags::UNUSED;
                let lo = self.pull();
                let hi = self.pull();
                jump = Some(u16::from_le_bytes([lo, hi]));
            }
            NOP => (),
        }

        self.reg.pc = jump.unwrap_or(next_pc);
        instr.cycles(acv)
    }

    /// ADC, binary and packed-BCD. The decimal path is the documented
    /// NMOS algorithm: carry split through the low nibble, each nibble
    /// adjusted by 0x0A/0xA0, V taken before the high-nibble correction.
    fn adc(&mut self, v: u8) {
        let acc = self.reg.a as u16;
        let add = v as u16;
        let carry_in = self.reg.p.contains(Flags::CARRY) as u16;

        let ans: u16;
        if self.reg.p.contains(Flags::DEC) {
            let mut lo = (acc & 0x0f) + (add & 0x0f) + carry_in;
            let mut carry_lo = 0;
            if lo >= 0x0a {
                carry_lo = 0x10;
                lo -= 0x0a;
            }
            let mut hi = (acc & 0xf0) + (add & 0xf0) + carry_lo;
            if hi >= 0xa0 {
                self.reg.p.insert(Flags::CARRY);
                hi -= 0xa0;
            } else {
                self.reg.p.remove(Flags::CARRY);
            }
            ans = hi | lo;
            self.reg.p.set(Flags::OVFL, (acc ^ ans) & 0x80 != 0 && (acc ^ add) & 0x80 == 0);
        } else {
            ans = acc + add + carry_in;
            self.reg.p.set(Flags::CARRY, ans > 0xff);
            self.reg
                .p
                .set(Flags::OVFL, (acc & 0x80) == (add & 0x80) && (acc & 0x80) != (ans & 0x80));
        }

        self.reg.a = ans as u8;
        self.reg.set_nz(self.reg.a);
    }

    /// SBC; carry acts as inverted borrow.
    fn sbc(&mut self, v: u8) {
        let acc = self.reg.a as u16;
        let sub = v as u16;
        let carry_in = self.reg.p.contains(Flags::CARRY) as u16;

        let ans: u16;
        if self.reg.p.contains(Flags::DEC) {
            let mut lo = 0x0f + (acc & 0x0f) - (sub & 0x0f) + carry_in;
            let carry_lo;
            if lo < 0x10 {
                lo = lo.wrapping_sub(0x06);
                carry_lo = 0;
            } else {
                lo -= 0x10;
                carry_lo = 0x10;
            }
            let mut hi = 0xf0 + (acc & 0xf0) - (sub & 0xf0) + carry_lo;
            if hi < 0x100 {
                self.reg.p.remove(Flags::CARRY);
                hi = hi.wrapping_sub(0x60);
            } else {
                self.reg.p.insert(Flags::CARRY);
                hi -= 0x100;
            }
            ans = hi | lo;
            self.reg.p.set(Flags::OVFL, (acc ^ ans) & 0x80 != 0 && (acc ^ sub) & 0x80 != 0);
        } else {
            ans = 0xff + acc - sub + carry_in;
            self.reg.p.set(Flags::CARRY, ans > 0xff);
            self.reg
                .p
                .set(Flags::OVFL, (acc & 0x80) != (sub & 0x80) && (acc & 0x80) != (ans & 0x80));
        }

        self.reg.a = ans as u8;
        self.reg.set_nz(self.reg.a);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::noninteractive::Noninteractive;
    use crate::c64::C64;
    use crate::peripheral::Peripherals;

    /// Machine with a flat-RAM banking configuration, program loaded at
    /// `org` and PC pointing at it.
    fn machine_with(org: u16, program: &[u8]) -> C64 {
        let peripherals: R2C<dyn Peripherals> = r2c_new!(Noninteractive::new());
        let mut c64 = C64::new(peripherals);
        c64.bus.borrow_mut().write(0x0001, 0x00);
        for (i, b) in program.iter().enumerate() {
            c64.bus.borrow_mut().write(org + i as u16, *b);
        }
        c64.cpu.set_pc(org);
        c64
    }

    fn run(c64: &mut C64, instructions: usize) {
        for _ in 0..instructions {
            c64.cpu.step_instruction();
        }
    }

    #[test]
    fn lda_sets_n_and_z() {
        let mut c64 = machine_with(0x2000, &[0xa9, 0x00, 0xa9, 0x80]);
        run(&mut c64, 1);
        assert!(c64.cpu.reg().p.contains(Flags::ZERO));
        run(&mut c64, 1);
        assert!(c64.cpu.reg().p.contains(Flags::NEG));
        assert!(!c64.cpu.reg().p.contains(Flags::ZERO));
        assert_eq!(c64.cpu.pc(), 0x2004, "PC advanced by encoded lengths");
    }

    #[test]
    fn adc_binary_carry_zero_overflow() {
        // CLC; LDA #$ff; ADC #$01 -> A=0, C=1, Z=1, V=0
        let mut c64 = machine_with(0x2000, &[0x18, 0xa9, 0xff, 0x69, 0x01]);
        run(&mut c64, 3);
        let reg = c64.cpu.reg();
        assert_eq!(reg.a, 0x00);
        assert!(reg.p.contains(Flags::CARRY));
        assert!(reg.p.contains(Flags::ZERO));
        assert!(!reg.p.contains(Flags::OVFL));

        // CLC; LDA #$50; ADC #$50 -> A=0xa0, V=1 (positive overflow), N=1
        let mut c64 = machine_with(0x2000, &[0x18, 0xa9, 0x50, 0x69, 0x50]);
        run(&mut c64, 3);
        let reg = c64.cpu.reg();
        assert_eq!(reg.a, 0xa0);
        assert!(reg.p.contains(Flags::OVFL));
        assert!(reg.p.contains(Flags::NEG));
        assert!(!reg.p.contains(Flags::CARRY));
    }

    #[test]
    fn adc_decimal() {
        // SED; SEC; LDA #$58; ADC #$46 -> 58 + 46 + 1 = 105: A=0x05, C=1
        let mut c64 = machine_with(0x2000, &[0xf8, 0x38, 0xa9, 0x58, 0x69, 0x46]);
        run(&mut c64, 4);
        let reg = c64.cpu.reg();
        assert_eq!(reg.a, 0x05);
        assert!(reg.p.contains(Flags::CARRY));

        // SED; CLC; LDA #$12 ; ADC #$34 -> A=0x46, C=0
        let mut c64 = machine_with(0x2000, &[0xf8, 0x18, 0xa9, 0x12, 0x69, 0x34]);
        run(&mut c64, 4);
        let reg = c64.cpu.reg();
        assert_eq!(reg.a, 0x46);
        assert!(!reg.p.contains(Flags::CARRY));
    }

    #[test]
    fn sbc_binary_borrow() {
        // SEC; LDA #$50; SBC #$f0 -> A=0x60, C=0 (borrow), V=0
        let mut c64 = machine_with(0x2000, &[0x38, 0xa9, 0x50, 0xe9, 0xf0]);
        run(&mut c64, 3);
        let reg = c64.cpu.reg();
        assert_eq!(reg.a, 0x60);
        assert!(!reg.p.contains(Flags::CARRY));
        assert!(!reg.p.contains(Flags::OVFL));

        // SEC; LDA #$50; SBC #$b0 -> A=0xa0, V=1, C=0
        let mut c64 = machine_with(0x2000, &[0x38, 0xa9, 0x50, 0xe9, 0xb0]);
        run(&mut c64, 3);
        let reg = c64.cpu.reg();
        assert_eq!(reg.a, 0xa0);
        assert!(reg.p.contains(Flags::OVFL));
    }

    #[test]
    fn sbc_decimal() {
        // SED; SEC; LDA #$46; SBC #$12 -> A=0x34, C=1
        let mut c64 = machine_with(0x2000, &[0xf8, 0x38, 0xa9, 0x46, 0xe9, 0x12]);
        run(&mut c64, 4);
        let reg = c64.cpu.reg();
        assert_eq!(reg.a, 0x34);
        assert!(reg.p.contains(Flags::CARRY));

        // SED; SEC; LDA #$12; SBC #$21 -> 12 - 21 = 91 borrow: A=0x91, C=0
        let mut c64 = machine_with(0x2000, &[0xf8, 0x38, 0xa9, 0x12, 0xe9, 0x21]);
        run(&mut c64, 4);
        let reg = c64.cpu.reg();
        assert_eq!(reg.a, 0x91);
        assert!(!reg.p.contains(Flags::CARRY));
    }

    #[test]
    fn decimal_results_stay_bcd() {
        // every valid BCD pair round-trips through ADC into a valid BCD
        // byte with the right decimal value
        let mut c64 = machine_with(0x2000, &[]);
        for a in 0..100u16 {
            for b in 0..100u16 {
                let bcd = |v: u16| ((v / 10) << 4 | (v % 10)) as u8;
                c64.bus.borrow_mut().write(0x2000, 0xf8); // SED
                c64.bus.borrow_mut().write(0x2001, 0x18); // CLC
                c64.bus.borrow_mut().write(0x2002, 0xa9); // LDA #a
                c64.bus.borrow_mut().write(0x2003, bcd(a));
                c64.bus.borrow_mut().write(0x2004, 0x69); // ADC #b
                c64.bus.borrow_mut().write(0x2005, bcd(b));
                c64.cpu.set_pc(0x2000);
                run(&mut c64, 4);
                let sum = a + b;
                let reg = c64.cpu.reg();
                assert_eq!(reg.a, bcd(sum % 100), "{} + {}", a, b);
                assert_eq!(reg.p.contains(Flags::CARRY), sum > 99, "{} + {}", a, b);
                assert!(reg.a & 0x0f <= 9 && reg.a >> 4 <= 9, "packed BCD stays valid");
            }
        }
    }

    #[test]
    fn php_plp_round_trip() {
        // SEC; SED; PHP; CLC; CLD; PLP
        let mut c64 = machine_with(0x2000, &[0x38, 0xf8, 0x08, 0x18, 0xd8, 0x28]);
        run(&mut c64, 6);
        let reg = c64.cpu.reg();
        assert!(reg.p.contains(Flags::CARRY));
        assert!(reg.p.contains(Flags::DEC));
        assert!(!reg.p.contains(Flags::BRK), "PLP clears B");
        assert!(reg.p.contains(Flags::UNUSED), "PLP sets the constant bit");
    }

    #[test]
    fn php_pushes_b_and_constant_set() {
        let mut c64 = machine_with(0x2000, &[0x08]);
        let sp_before = c64.cpu.reg().sp;
        run(&mut c64, 1);
        let stacked = c64.bus.borrow().read(0x0100 + sp_before as u16);
        assert_eq!(stacked & 0x30, 0x30);
        assert_eq!(c64.cpu.reg().p_ext() & 0x20, 0x20, "constant bit always observable as 1");
    }

    #[test]
    fn pha_pla_round_trip() {
        let mut c64 = machine_with(0x2000, &[0xa9, 0x5a, 0x48, 0xa9, 0x00, 0x68]);
        run(&mut c64, 4);
        let reg = c64.cpu.reg();
        assert_eq!(reg.a, 0x5a);
        assert!(!reg.p.contains(Flags::ZERO));
    }

    #[test]
    fn jsr_rts_round_trip() {
        // LDX #$ff; TXS; JSR $2100 -- subroutine at 0x2100 is a bare RTS
        let mut c64 = machine_with(0x2000, &[0xa2, 0xff, 0x9a, 0x20, 0x00, 0x21]);
        c64.bus.borrow_mut().write(0x2100, 0x60);
        run(&mut c64, 3);
        assert_eq!(c64.cpu.pc(), 0x2100);
        // JSR pushed 0x2005, the address of its own last byte
        let sp = c64.cpu.reg().sp;
        assert_eq!(sp, 0xfd);
        let stacked = c64.bus.borrow().read_word(0x0100 + sp as u16 + 1);
        assert_eq!(stacked, 0x2005);
        run(&mut c64, 1);
        assert_eq!(c64.cpu.pc(), 0x2006, "RTS resumes after the JSR");
    }

    #[test]
    fn brk_and_rti() {
        // vector 0xfffe -> 0x2100 (flat RAM, so plain writes)
        let mut c64 = machine_with(0x2000, &[0x00, 0xea, 0xea]);
        c64.bus.borrow_mut().write(0xfffe, 0x00);
        c64.bus.borrow_mut().write(0xffff, 0x21);
        c64.bus.borrow_mut().write(0x2100, 0x40); // RTI
        run(&mut c64, 1);
        assert_eq!(c64.cpu.pc(), 0x2100);
        assert!(c64.cpu.reg().p.contains(Flags::IRQD));
        let sp = c64.cpu.reg().sp;
        let stacked_p = c64.bus.borrow().read(0x0100 + sp as u16 + 1);
        assert_eq!(stacked_p & 0x30, 0x30, "BRK pushes B=1 and the constant bit");
        run(&mut c64, 1);
        assert_eq!(c64.cpu.pc(), 0x2002, "BRK return address skips its padding byte");
        assert!(!c64.cpu.reg().p.contains(Flags::IRQD), "RTI restored the pre-BRK status");
    }

    #[test]
    fn irq_respects_interrupt_disable() {
        let mut c64 = machine_with(0x2000, &[0x78, 0xea, 0x58, 0xea, 0xea]); // SEI; NOP; CLI; NOP
        c64.bus.borrow_mut().write(0xfffe, 0x00);
        c64.bus.borrow_mut().write(0xffff, 0x30);
        run(&mut c64, 1); // SEI
        c64.irq.raise();
        run(&mut c64, 1); // NOP, request pending but masked
        assert_ne!(c64.cpu.pc(), 0x3000);
        run(&mut c64, 1); // CLI
        run(&mut c64, 1); // pending request is accepted now
        assert_eq!(c64.cpu.pc(), 0x3000);
        assert!(c64.cpu.reg().p.contains(Flags::IRQD), "interrupt entry masks further IRQs");
        // B pushed as 0 for a hardware interrupt
        let sp = c64.cpu.reg().sp;
        let stacked_p = c64.bus.borrow().read(0x0100 + sp as u16 + 1);
        assert_eq!(stacked_p & 0x30, 0x20);
    }

    #[test]
    fn nmi_ignores_interrupt_disable() {
        let mut c64 = machine_with(0x2000, &[0x78, 0xea]); // SEI; NOP
        c64.bus.borrow_mut().write(0xfffa, 0x00);
        c64.bus.borrow_mut().write(0xfffb, 0x40);
        run(&mut c64, 1);
        c64.nmi.raise();
        run(&mut c64, 1);
        assert_eq!(c64.cpu.pc(), 0x4000);
    }

    #[test]
    fn zero_page_indexing_wraps() {
        // LDX #$20; LDA $f0,X -> reads 0x0010, not 0x0110
        let mut c64 = machine_with(0x2000, &[0xa2, 0x20, 0xb5, 0xf0]);
        c64.bus.borrow_mut().write(0x0010, 0x42);
        c64.bus.borrow_mut().write(0x0110, 0x99);
        run(&mut c64, 2);
        assert_eq!(c64.cpu.reg().a, 0x42);
    }

    #[test]
    fn indexed_indirect_x() {
        // LDX #$04; LDA ($20,X) -> pointer at 0x24 -> 0x3000
        let mut c64 = machine_with(0x2000, &[0xa2, 0x04, 0xa1, 0x20]);
        c64.bus.borrow_mut().write(0x0024, 0x00);
        c64.bus.borrow_mut().write(0x0025, 0x30);
        c64.bus.borrow_mut().write(0x3000, 0x7b);
        run(&mut c64, 2);
        assert_eq!(c64.cpu.reg().a, 0x7b);
    }

    #[test]
    fn indirect_indexed_y() {
        // LDY #$10; LDA ($20),Y -> pointer at 0x20 = 0x30f8, +Y = 0x3108
        let mut c64 = machine_with(0x2000, &[0xa0, 0x10, 0xb1, 0x20]);
        c64.bus.borrow_mut().write(0x0020, 0xf8);
        c64.bus.borrow_mut().write(0x0021, 0x30);
        c64.bus.borrow_mut().write(0x3108, 0x6d);
        run(&mut c64, 2);
        assert_eq!(c64.cpu.reg().a, 0x6d);
    }

    #[test]
    fn indirect_jmp() {
        let mut c64 = machine_with(0x2000, &[0x6c, 0x00, 0x03]);
        c64.bus.borrow_mut().write(0x0300, 0x34);
        c64.bus.borrow_mut().write(0x0301, 0x12);
        run(&mut c64, 1);
        assert_eq!(c64.cpu.pc(), 0x1234);
    }

    #[test]
    fn branches_follow_signed_offsets() {
        // LDX #$02: loop: DEX; BNE loop; NOP
        let mut c64 = machine_with(0x2000, &[0xa2, 0x02, 0xca, 0xd0, 0xfd, 0xea]);
        run(&mut c64, 2); // LDX, DEX
        run(&mut c64, 1); // BNE taken
        assert_eq!(c64.cpu.pc(), 0x2002);
        run(&mut c64, 2); // DEX (X=0), BNE not taken
        assert_eq!(c64.cpu.pc(), 0x2005);
    }

    #[test]
    fn compare_sets_carry_like_sub() {
        // LDA #$30; CMP #$31 / #$30 / #$2f
        let mut c64 = machine_with(0x2000, &[0xa9, 0x30, 0xc9, 0x31, 0xc9, 0x30, 0xc9, 0x2f]);
        run(&mut c64, 2);
        assert!(!c64.cpu.reg().p.contains(Flags::CARRY));
        assert!(c64.cpu.reg().p.contains(Flags::NEG));
        run(&mut c64, 1);
        assert!(c64.cpu.reg().p.contains(Flags::CARRY));
        assert!(c64.cpu.reg().p.contains(Flags::ZERO));
        run(&mut c64, 1);
        assert!(c64.cpu.reg().p.contains(Flags::CARRY));
        assert!(!c64.cpu.reg().p.contains(Flags::ZERO));
    }

    #[test]
    fn bit_test_flags() {
        // LDA #$01; BIT $40 with memory 0xc0 -> Z=1 (no common bits), N=1, V=1
        let mut c64 = machine_with(0x2000, &[0xa9, 0x01, 0x24, 0x40]);
        c64.bus.borrow_mut().write(0x0040, 0xc0);
        run(&mut c64, 2);
        let reg = c64.cpu.reg();
        assert!(reg.p.contains(Flags::ZERO));
        assert!(reg.p.contains(Flags::NEG));
        assert!(reg.p.contains(Flags::OVFL));
    }

    #[test]
    fn rotate_through_carry() {
        // SEC; LDA #$80; ROL A -> A=0x01, C=1
        let mut c64 = machine_with(0x2000, &[0x38, 0xa9, 0x80, 0x2a]);
        run(&mut c64, 3);
        assert_eq!(c64.cpu.reg().a, 0x01);
        assert!(c64.cpu.reg().p.contains(Flags::CARRY));

        // CLC; LDA #$01; ROR A -> A=0x00, C=1, Z=1
        let mut c64 = machine_with(0x2000, &[0x18, 0xa9, 0x01, 0x6a]);
        run(&mut c64, 3);
        assert_eq!(c64.cpu.reg().a, 0x00);
        assert!(c64.cpu.reg().p.contains(Flags::CARRY));
        assert!(c64.cpu.reg().p.contains(Flags::ZERO));
    }

    #[test]
    fn rmw_through_memory() {
        // INC $40; ASL $40 with memory 0x7f -> 0x80 -> 0x00, C=1
        let mut c64 = machine_with(0x2000, &[0xe6, 0x40, 0x06, 0x40]);
        c64.bus.borrow_mut().write(0x0040, 0x7f);
        run(&mut c64, 1);
        assert_eq!(c64.bus.borrow().read(0x0040), 0x80);
        run(&mut c64, 1);
        assert_eq!(c64.bus.borrow().read(0x0040), 0x00);
        assert!(c64.cpu.reg().p.contains(Flags::CARRY));
    }

    #[test]
    fn stack_pointer_wraps_within_page_one() {
        // LDA #$77, then PHA three times starting from SP=0
        let mut c64 = machine_with(0x2000, &[0xa9, 0x77, 0x48, 0x48, 0x48]);
        run(&mut c64, 4);
        assert_eq!(c64.cpu.reg().sp, 0xfd, "SP wrapped below 0x00");
        assert_eq!(c64.bus.borrow().read(0x0100), 0x77);
        assert_eq!(c64.bus.borrow().read(0x01ff), 0x77);
    }

    #[test]
    fn reset_reads_vector_through_banking() {
        // scenario: KERNAL image carrying the reset vector, HIRAM on
        let peripherals: R2C<dyn Peripherals> = r2c_new!(Noninteractive::new());
        let mut c64 = C64::new(peripherals);
        let mut kernal = vec![0u8; 0x2000];
        kernal[0x1ffc] = 0xfc;
        kernal[0x1ffd] = 0xe3;
        c64.load_rom(&kernal, 0xe000, crate::rom::RomTarget::Rom);
        c64.bus.borrow_mut().write(0x0001, 0x02); // HIRAM only
        c64.reset();
        assert_eq!(c64.cpu.pc(), 0xe3fc);
        assert_eq!(c64.cpu.reg().sp, 0);
        assert_eq!(c64.cpu.reg().a, 0);
    }

    #[test]
    fn cycle_budget_carries_deficit() {
        let mut c64 = machine_with(0x2000, &[0xea; 32]); // NOPs, 2 cycles each
        c64.cpu.feed_cycles(7);
        // 7 cycles: four NOPs retire (budget goes 7,5,3,1 -> -1)
        assert_eq!(c64.cpu.pc(), 0x2004);
        c64.cpu.feed_cycles(2);
        // deficit of 1 + 2 = 1 -> one more NOP
        assert_eq!(c64.cpu.pc(), 0x2005);
    }
}
