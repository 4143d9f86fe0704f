// SM83 core (subset)
use super::bus::Bus;
use crate::engine::EngineFault;

#[derive(Default, Clone, Copy)]
struct Flags {
    z: bool, // zero
    n: bool, // subtract
    h: bool, // half-carry
    c: bool, // carry
}

impl Flags {
    fn to_byte(self) -> u8 {
        (self.z as u8) << 7 | (self.n as u8) << 6 | (self.h as u8) << 5 | (self.c as u8) << 4
    }

    fn from_byte(v: u8) -> Self {
        Self { z: v & 0x80 != 0, n: v & 0x40 != 0, h: v & 0x20 != 0, c: v & 0x10 != 0 }
    }
}

pub struct Cpu {
    // 8-bit regs
    a: u8, f: Flags,
    b: u8, c: u8,
    d: u8, e: u8,
    h: u8, l: u8,

    sp: u16,
    pc: u16,

    ime: bool, // interrupt master enable
    halted: bool,
}

impl Cpu {
    pub fn new() -> Self {
        // Registers as left by the DMG boot ROM; execution starts at the
        // cartridge entry point.
        Self {
            a: 0x01,
            f: Flags { z: true, n: false, h: true, c: true },
            b: 0x00, c: 0x13,
            d: 0x00, e: 0xD8,
            h: 0x01, l: 0x4D,
            sp: 0xFFFE,
            pc: 0x0100,
            ime: false,
            halted: false,
        }
    }

    /// Execute one instruction (or interrupt dispatch). Returns T-cycles.
    pub fn step(&mut self, bus: &mut Bus) -> Result<u8, EngineFault> {
        let pending = bus.ie & bus.iflag & 0x1F;
        if pending != 0 {
            self.halted = false;
            if self.ime {
                let bit = pending.trailing_zeros() as u16;
                bus.iflag &= !(1 << bit);
                self.ime = false;
                self.push16(bus, self.pc);
                self.pc = 0x0040 + bit * 8;
                return Ok(20);
            }
        }

        if self.halted {
            return Ok(4);
        }

        let op = self.fetch8(bus);
        let cycles = match op {
            0x00 => 4, // NOP

            0x01 | 0x11 | 0x21 | 0x31 => { // LD rr, d16
                let v = self.fetch16(bus);
                self.set_rr(op >> 4, v);
                12
            }

            0x02 => { bus.write8(self.bc(), self.a); 8 }
            0x12 => { bus.write8(self.de(), self.a); 8 }
            0x0A => { self.a = bus.read8(self.bc()); 8 }
            0x1A => { self.a = bus.read8(self.de()); 8 }
            0x22 | 0x32 => { // LD (HL+/-), A
                let hl = self.hl();
                bus.write8(hl, self.a);
                self.set_hl(if op == 0x22 { hl.wrapping_add(1) } else { hl.wrapping_sub(1) });
                8
            }
            0x2A | 0x3A => { // LD A, (HL+/-)
                let hl = self.hl();
                self.a = bus.read8(hl);
                self.set_hl(if op == 0x2A { hl.wrapping_add(1) } else { hl.wrapping_sub(1) });
                8
            }

            0x03 | 0x13 | 0x23 | 0x33 => { // INC rr
                let v = self.rr(op >> 4).wrapping_add(1);
                self.set_rr(op >> 4, v);
                8
            }
            0x0B | 0x1B | 0x2B | 0x3B => { // DEC rr
                let v = self.rr(op >> 4).wrapping_sub(1);
                self.set_rr(op >> 4, v);
                8
            }

            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => { // INC r
                let r = (op >> 3) & 7;
                let v = self.r8(bus, r);
                let res = v.wrapping_add(1);
                self.f = Flags { z: res == 0, n: false, h: v & 0x0F == 0x0F, c: self.f.c };
                self.set_r8(bus, r, res);
                if r == 6 { 12 } else { 4 }
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => { // DEC r
                let r = (op >> 3) & 7;
                let v = self.r8(bus, r);
                let res = v.wrapping_sub(1);
                self.f = Flags { z: res == 0, n: true, h: v & 0x0F == 0, c: self.f.c };
                self.set_r8(bus, r, res);
                if r == 6 { 12 } else { 4 }
            }

            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => { // LD r, d8
                let v = self.fetch8(bus);
                let r = (op >> 3) & 7;
                self.set_r8(bus, r, v);
                if r == 6 { 12 } else { 8 }
            }

            0x18 => { // JR e
                let off = self.fetch8(bus) as i8;
                self.pc = self.pc.wrapping_add_signed(off as i16);
                12
            }
            0x20 | 0x28 | 0x30 | 0x38 => { // JR cc, e
                let off = self.fetch8(bus) as i8;
                if self.cond(op >> 3) {
                    self.pc = self.pc.wrapping_add_signed(off as i16);
                    12
                } else {
                    8
                }
            }

            0x2F => { // CPL
                self.a = !self.a;
                self.f.n = true;
                self.f.h = true;
                4
            }
            0x37 => { self.f = Flags { z: self.f.z, n: false, h: false, c: true }; 4 } // SCF
            0x3F => { self.f = Flags { z: self.f.z, n: false, h: false, c: !self.f.c }; 4 } // CCF

            0x76 => { // HALT
                self.halted = true;
                4
            }

            0x40..=0x7F => { // LD r, r'
                let v = self.r8(bus, op & 7);
                self.set_r8(bus, (op >> 3) & 7, v);
                if op & 7 == 6 || (op >> 3) & 7 == 6 { 8 } else { 4 }
            }

            0x80..=0xBF => { // ALU A, r
                let v = self.r8(bus, op & 7);
                self.alu((op >> 3) & 7, v);
                if op & 7 == 6 { 8 } else { 4 }
            }
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => { // ALU A, d8
                let v = self.fetch8(bus);
                self.alu((op >> 3) & 7, v);
                8
            }

            0xC3 => { // JP a16
                let addr = self.fetch16(bus);
                self.pc = addr;
                16
            }
            0xC2 | 0xCA | 0xD2 | 0xDA => { // JP cc, a16
                let addr = self.fetch16(bus);
                if self.cond(op >> 3) {
                    self.pc = addr;
                    16
                } else {
                    12
                }
            }
            0xE9 => { self.pc = self.hl(); 4 } // JP HL

            0xCD => { // CALL a16
                let addr = self.fetch16(bus);
                self.push16(bus, self.pc);
                self.pc = addr;
                24
            }
            0xC9 => { // RET
                self.pc = self.pop16(bus);
                16
            }
            0xD9 => { // RETI
                self.pc = self.pop16(bus);
                self.ime = true;
                16
            }

            0xC1 | 0xD1 | 0xE1 | 0xF1 => { // POP rr
                let v = self.pop16(bus);
                self.set_stack_rr(op >> 4, v);
                12
            }
            0xC5 | 0xD5 | 0xE5 | 0xF5 => { // PUSH rr
                let v = self.stack_rr(op >> 4);
                self.push16(bus, v);
                16
            }

            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => { // RST
                self.push16(bus, self.pc);
                self.pc = (op & 0x38) as u16;
                16
            }

            0xE0 => { // LDH (a8), A
                let a8 = self.fetch8(bus) as u16;
                bus.write8(0xFF00 | a8, self.a);
                12
            }
            0xF0 => { // LDH A, (a8)
                let a8 = self.fetch8(bus) as u16;
                self.a = bus.read8(0xFF00 | a8);
                12
            }
            0xE2 => { bus.write8(0xFF00 | self.c as u16, self.a); 8 }
            0xF2 => { self.a = bus.read8(0xFF00 | self.c as u16); 8 }
            0xEA => { // LD (a16), A
                let addr = self.fetch16(bus);
                bus.write8(addr, self.a);
                16
            }
            0xFA => { // LD A, (a16)
                let addr = self.fetch16(bus);
                self.a = bus.read8(addr);
                16
            }

            0xF3 => { self.ime = false; 4 } // DI
            0xFB => { self.ime = true; 4 }  // EI (no one-instruction delay)

            _ => {
                // TODO: CB-prefixed ops, DAA, rotates, SP arithmetic, STOP
                return Err(EngineFault::UnimplementedOpcode { opcode: op, pc: self.pc.wrapping_sub(1) });
            }
        };
        Ok(cycles)
    }

    fn alu(&mut self, op: u8, v: u8) {
        let a = self.a;
        let carry = self.f.c as u8;
        match op {
            0 | 1 => { // ADD / ADC
                let cin = if op == 1 { carry } else { 0 };
                let res = a as u16 + v as u16 + cin as u16;
                self.a = res as u8;
                self.f = Flags { z: self.a == 0, n: false, h: (a & 0x0F) + (v & 0x0F) + cin > 0x0F, c: res > 0xFF };
            }
            2 | 3 | 7 => { // SUB / SBC / CP
                let cin = if op == 3 { carry } else { 0 };
                let res = a.wrapping_sub(v).wrapping_sub(cin);
                self.f = Flags {
                    z: res == 0,
                    n: true,
                    h: (a & 0x0F) < (v & 0x0F) + cin,
                    c: (a as u16) < v as u16 + cin as u16,
                };
                if op != 7 {
                    self.a = res;
                }
            }
            4 => { self.a &= v; self.f = Flags { z: self.a == 0, n: false, h: true, c: false }; }
            5 => { self.a ^= v; self.f = Flags { z: self.a == 0, n: false, h: false, c: false }; }
            _ => { self.a |= v; self.f = Flags { z: self.a == 0, n: false, h: false, c: false }; }
        }
    }

    fn cond(&self, cc: u8) -> bool {
        match cc & 3 {
            0 => !self.f.z,
            1 => self.f.z,
            2 => !self.f.c,
            _ => self.f.c,
        }
    }

    // B C D E H L (HL) A
    fn r8(&self, bus: &Bus, r: u8) -> u8 {
        match r {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => self.h,
            5 => self.l,
            6 => bus.read8(self.hl()),
            _ => self.a,
        }
    }

    fn set_r8(&mut self, bus: &mut Bus, r: u8, v: u8) {
        match r {
            0 => self.b = v,
            1 => self.c = v,
            2 => self.d = v,
            3 => self.e = v,
            4 => self.h = v,
            5 => self.l = v,
            6 => bus.write8(self.hl(), v),
            _ => self.a = v,
        }
    }

    // BC DE HL SP
    fn rr(&self, i: u8) -> u16 {
        match i & 3 {
            0 => self.bc(),
            1 => self.de(),
            2 => self.hl(),
            _ => self.sp,
        }
    }

    fn set_rr(&mut self, i: u8, v: u16) {
        let (hi, lo) = ((v >> 8) as u8, v as u8);
        match i & 3 {
            0 => (self.b, self.c) = (hi, lo),
            1 => (self.d, self.e) = (hi, lo),
            2 => (self.h, self.l) = (hi, lo),
            _ => self.sp = v,
        }
    }

    // BC DE HL AF
    fn stack_rr(&self, i: u8) -> u16 {
        match i & 3 {
            3 => (self.a as u16) << 8 | self.f.to_byte() as u16,
            i => self.rr(i),
        }
    }

    fn set_stack_rr(&mut self, i: u8, v: u16) {
        match i & 3 {
            3 => {
                self.a = (v >> 8) as u8;
                self.f = Flags::from_byte(v as u8);
            }
            i => self.set_rr(i, v),
        }
    }

    fn bc(&self) -> u16 { (self.b as u16) << 8 | self.c as u16 }
    fn de(&self) -> u16 { (self.d as u16) << 8 | self.e as u16 }
    fn hl(&self) -> u16 { (self.h as u16) << 8 | self.l as u16 }

    fn set_hl(&mut self, v: u16) {
        self.set_rr(2, v);
    }

    fn fetch8(&mut self, bus: &Bus) -> u8 {
        let v = bus.read8(self.pc);
        self.pc = self.pc.wrapping_add(1);
        v
    }

    fn fetch16(&mut self, bus: &Bus) -> u16 {
        let v = bus.read16(self.pc);
        self.pc = self.pc.wrapping_add(2);
        v
    }

    fn push16(&mut self, bus: &mut Bus, v: u16) {
        self.sp = self.sp.wrapping_sub(1);
        bus.write8(self.sp, (v >> 8) as u8);
        self.sp = self.sp.wrapping_sub(1);
        bus.write8(self.sp, (v & 0xFF) as u8);
    }

    fn pop16(&mut self, bus: &Bus) -> u16 {
        let v = bus.read16(self.sp);
        self.sp = self.sp.wrapping_add(2);
        v
    }
}
