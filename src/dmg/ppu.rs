// LCD timing and background/window rendering
use crate::{FRAME_BYTES, HEIGHT, WIDTH};

const DOTS_PER_LINE: u32 = 456;
const LINES_PER_FRAME: u8 = 154;
const OAM_SCAN_END: u32 = 80;
const DRAW_END: u32 = 252;

// DMG green, lightest to darkest
const SHADES: [[u8; 3]; 4] = [
    [0xE0, 0xF8, 0xD0],
    [0x88, 0xC0, 0x70],
    [0x34, 0x68, 0x56],
    [0x08, 0x18, 0x20],
];

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Mode {
    HBlank = 0,
    VBlank = 1,
    OamScan = 2,
    Drawing = 3,
}

pub struct Ppu {
    pub lcdc: u8,
    pub stat: u8,
    pub scy: u8,
    pub scx: u8,
    pub ly: u8,
    pub lyc: u8,
    pub bgp: u8,
    pub wy: u8,
    pub wx: u8,
    dot: u32,
    window_line: u8,
    fb: Vec<u8>, // RGBA 160*144*4
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            lcdc: 0x91,
            stat: 0x85,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            bgp: 0xFC,
            wy: 0,
            wx: 0,
            dot: 0,
            window_line: 0,
            fb: blank(),
        }
    }

    fn mode(&self) -> Mode {
        match self.stat & 0x03 {
            0 => Mode::HBlank,
            1 => Mode::VBlank,
            2 => Mode::OamScan,
            _ => Mode::Drawing,
        }
    }

    /// Advance by `cycles` dots. Returns (vblank irq, stat irq).
    pub fn step(&mut self, cycles: u32, vram: &[u8]) -> (bool, bool) {
        if self.lcdc & 0x80 == 0 {
            self.ly = 0;
            self.dot = 0;
            self.window_line = 0;
            self.stat &= !0x03;
            return (false, false);
        }

        let mut vblank = false;
        let mut stat_irq = false;
        for _ in 0..cycles {
            self.dot += 1;
            if self.dot == DOTS_PER_LINE {
                self.dot = 0;
                self.ly = (self.ly + 1) % LINES_PER_FRAME;
                if self.ly == 0 {
                    self.window_line = 0;
                }
                stat_irq |= self.compare_ly();
            }

            let mode = if self.ly as usize >= HEIGHT {
                Mode::VBlank
            } else if self.dot < OAM_SCAN_END {
                Mode::OamScan
            } else if self.dot < DRAW_END {
                Mode::Drawing
            } else {
                Mode::HBlank
            };

            if mode != self.mode() {
                self.stat = (self.stat & !0x03) | mode as u8;
                match mode {
                    Mode::HBlank => {
                        self.render_line(vram);
                        stat_irq |= self.stat & 0x08 != 0;
                    }
                    Mode::VBlank => {
                        vblank = true;
                        stat_irq |= self.stat & 0x10 != 0;
                    }
                    Mode::OamScan => stat_irq |= self.stat & 0x20 != 0,
                    Mode::Drawing => {}
                }
            }
        }
        (vblank, stat_irq)
    }

    fn compare_ly(&mut self) -> bool {
        if self.ly == self.lyc {
            self.stat |= 0x04;
            self.stat & 0x40 != 0
        } else {
            self.stat &= !0x04;
            false
        }
    }

    fn render_line(&mut self, vram: &[u8]) {
        let ly = self.ly;
        let row = ly as usize * WIDTH * 4;
        let window_on = self.lcdc & 0x20 != 0 && ly >= self.wy && self.wx <= 166;

        for x in 0..WIDTH as u8 {
            let color = if self.lcdc & 0x01 == 0 {
                0
            } else if window_on && x + 7 >= self.wx {
                let map = if self.lcdc & 0x40 != 0 { 0x1C00 } else { 0x1800 };
                self.tile_pixel(vram, map, x + 7 - self.wx, self.window_line)
            } else {
                let map = if self.lcdc & 0x08 != 0 { 0x1C00 } else { 0x1800 };
                self.tile_pixel(vram, map, x.wrapping_add(self.scx), ly.wrapping_add(self.scy))
            };

            let shade = (self.bgp >> (color * 2)) & 0x03;
            let [r, g, b] = SHADES[shade as usize];
            let i = row + x as usize * 4;
            self.fb[i..i + 4].copy_from_slice(&[r, g, b, 0xFF]);
        }

        if window_on {
            self.window_line += 1;
        }
    }

    // 2-bit color id at (x, y) of a 256x256 tile map
    fn tile_pixel(&self, vram: &[u8], map: usize, x: u8, y: u8) -> u8 {
        let tile = vram[map + (y as usize / 8) * 32 + x as usize / 8];
        let base = if self.lcdc & 0x10 != 0 {
            tile as usize * 16
        } else {
            (0x1000 + (tile as i8 as i32) * 16) as usize
        };
        let addr = base + (y as usize % 8) * 2;
        let bit = 7 - (x % 8);
        let lo = (vram[addr] >> bit) & 1;
        let hi = (vram[addr + 1] >> bit) & 1;
        (hi << 1) | lo
    }

    // TODO: OBJ layer (OAM sprites) is not drawn yet

    pub fn framebuffer_rgba(&self) -> &[u8] {
        &self.fb
    }
}

fn blank() -> Vec<u8> {
    let [r, g, b] = SHADES[0];
    [r, g, b, 0xFF].repeat(FRAME_BYTES / 4)
}
