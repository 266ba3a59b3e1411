// graph/program.rs — Compiled program and its two interpreters
//
// A program is a flat byte sequence (opcode u8, little-endian u16 slot
// addresses, then a fixed per-opcode payload) plus a scalar memory template.
// The template is laid out [x, y, z, constants.., intermediates..] and then
// doubled, first half mirrored into the second: the scalar evaluator uses
// only the first half, the interval evaluator uses the first half for lower
// bounds and the second for upper bounds. One address space serves both.
//
// Programs are immutable after compilation and safe to share across threads;
// all evaluation state lives in a caller-owned EvalScratch.

use crate::graph::catalog::NodeKind;
use crate::interval::{self, Interval};
use crate::provider::{CurveSource, ImageSource, NoiseSource};
use std::f32::consts::PI;
use std::sync::Arc;

// ── Bytecode encoding ───────────────────────────────────────────────

pub(crate) fn emit_u8(code: &mut Vec<u8>, v: u8) {
    code.push(v);
}

pub(crate) fn emit_u16(code: &mut Vec<u8>, v: u16) {
    code.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn emit_f32(code: &mut Vec<u8>, v: f32) {
    code.extend_from_slice(&v.to_le_bytes());
}

/// Forward-only reader over the instruction stream. All reads are explicit
/// little-endian byte copies, so the bytecode needs no alignment padding.
struct Cursor<'a> {
    code: &'a [u8],
    pc: usize,
}

impl<'a> Cursor<'a> {
    fn new(code: &'a [u8]) -> Self {
        Cursor { code, pc: 0 }
    }

    #[inline]
    fn done(&self) -> bool {
        self.pc >= self.code.len()
    }

    #[inline]
    fn next_u8(&mut self) -> u8 {
        let v = self.code[self.pc];
        self.pc += 1;
        v
    }

    /// A u16 memory slot address (or resource table index).
    #[inline]
    fn addr(&mut self) -> usize {
        let v = u16::from_le_bytes([self.code[self.pc], self.code[self.pc + 1]]);
        self.pc += 2;
        v as usize
    }

    #[inline]
    fn next_f32(&mut self) -> f32 {
        let v = f32::from_le_bytes([
            self.code[self.pc],
            self.code[self.pc + 1],
            self.code[self.pc + 2],
            self.code[self.pc + 3],
        ]);
        self.pc += 4;
        v
    }
}

// ── Scratch memory ──────────────────────────────────────────────────

/// Caller-owned evaluation memory, initialized from the program's template.
///
/// Programs never mutate themselves; several threads may evaluate the same
/// program concurrently as long as each holds its own scratch.
pub struct EvalScratch {
    mem: Vec<f32>,
}

// ── Program ─────────────────────────────────────────────────────────

/// An immutable compiled graph: bytecode, memory template, iso scale, and
/// the resource tables the bytecode indexes into.
pub struct Program {
    bytecode: Vec<u8>,
    memory_template: Vec<f32>,
    iso_scale: f32,
    curves: Vec<Arc<dyn CurveSource>>,
    noises: Vec<Arc<dyn NoiseSource>>,
    images: Vec<Arc<dyn ImageSource>>,
}

impl Default for Program {
    /// The empty program: no instructions, zeroed memory, evaluates to 0.
    fn default() -> Self {
        Program {
            bytecode: Vec::new(),
            memory_template: vec![0.0; 8],
            iso_scale: 1.0,
            curves: Vec::new(),
            noises: Vec::new(),
            images: Vec::new(),
        }
    }
}

impl Program {
    pub(crate) fn from_parts(
        bytecode: Vec<u8>,
        memory_template: Vec<f32>,
        iso_scale: f32,
        curves: Vec<Arc<dyn CurveSource>>,
        noises: Vec<Arc<dyn NoiseSource>>,
        images: Vec<Arc<dyn ImageSource>>,
    ) -> Self {
        debug_assert!(memory_template.len() % 2 == 0);
        debug_assert!(memory_template.len() / 2 <= u16::MAX as usize + 1);
        Program {
            bytecode,
            memory_template,
            iso_scale,
            curves,
            noises,
            images,
        }
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    /// Total template length (both halves).
    pub fn memory_len(&self) -> usize {
        self.memory_template.len()
    }

    /// The initial memory image, constants included.
    pub fn memory_template(&self) -> &[f32] {
        &self.memory_template
    }

    /// Slots addressable by instructions (one half).
    pub fn slot_count(&self) -> usize {
        self.memory_template.len() / 2
    }

    pub fn iso_scale(&self) -> f32 {
        self.iso_scale
    }

    pub fn new_scratch(&self) -> EvalScratch {
        EvalScratch {
            mem: self.memory_template.clone(),
        }
    }

    // ── Scalar evaluation ───────────────────────────────────────────

    /// Evaluate the SDF at one position. Hot loop: a flat match over the
    /// opcode byte, program counter advancing monotonically, no allocation.
    pub fn eval(&self, scratch: &mut EvalScratch, x: f32, y: f32, z: f32) -> f32 {
        debug_assert_eq!(scratch.mem.len(), self.memory_template.len());
        let half = self.memory_template.len() / 2;
        let mem = &mut scratch.mem[..half];
        mem[0] = x;
        mem[1] = y;
        mem[2] = z;

        let mut c = Cursor::new(&self.bytecode);
        while !c.done() {
            let op = decode_opcode(c.next_u8());
            match op {
                NodeKind::Constant
                | NodeKind::InputX
                | NodeKind::InputY
                | NodeKind::InputZ
                | NodeKind::OutputSdf => {
                    panic!("structural opcode {:?} in compiled program", op)
                }

                NodeKind::Add => {
                    let (a, b, o) = (c.addr(), c.addr(), c.addr());
                    mem[o] = mem[a] + mem[b];
                }
                NodeKind::Subtract => {
                    let (a, b, o) = (c.addr(), c.addr(), c.addr());
                    mem[o] = mem[a] - mem[b];
                }
                NodeKind::Multiply => {
                    let (a, b, o) = (c.addr(), c.addr(), c.addr());
                    mem[o] = mem[a] * mem[b];
                }
                NodeKind::Sine => {
                    let (a, o) = (c.addr(), c.addr());
                    mem[o] = (PI * mem[a]).sin();
                }
                NodeKind::Floor => {
                    let (a, o) = (c.addr(), c.addr());
                    mem[o] = mem[a].floor();
                }
                NodeKind::Abs => {
                    let (a, o) = (c.addr(), c.addr());
                    mem[o] = mem[a].abs();
                }
                NodeKind::Sqrt => {
                    let (a, o) = (c.addr(), c.addr());
                    mem[o] = mem[a].sqrt();
                }
                NodeKind::Distance2D => {
                    let (x0, y0, x1, y1, o) = (c.addr(), c.addr(), c.addr(), c.addr(), c.addr());
                    let dx = mem[x1] - mem[x0];
                    let dy = mem[y1] - mem[y0];
                    mem[o] = (dx * dx + dy * dy).sqrt();
                }
                NodeKind::Distance3D => {
                    let (x0, y0, z0) = (c.addr(), c.addr(), c.addr());
                    let (x1, y1, z1, o) = (c.addr(), c.addr(), c.addr(), c.addr());
                    let dx = mem[x1] - mem[x0];
                    let dy = mem[y1] - mem[y0];
                    let dz = mem[z1] - mem[z0];
                    mem[o] = (dx * dx + dy * dy + dz * dz).sqrt();
                }
                NodeKind::Clamp => {
                    let (a, o) = (c.addr(), c.addr());
                    let (min, max) = (c.next_f32(), c.next_f32());
                    mem[o] = mem[a].max(min).min(max);
                }
                NodeKind::Mix => {
                    let (a, b, t, o) = (c.addr(), c.addr(), c.addr(), c.addr());
                    mem[o] = mem[a] + mem[t] * (mem[b] - mem[a]);
                }
                NodeKind::Remap => {
                    let (a, o) = (c.addr(), c.addr());
                    let (c0, m0, c1, m1) =
                        (c.next_f32(), c.next_f32(), c.next_f32(), c.next_f32());
                    mem[o] = ((mem[a] + c0) * m0) * m1 + c1;
                }
                NodeKind::Curve => {
                    let (a, o) = (c.addr(), c.addr());
                    let _monotonic = c.next_u8();
                    let (_rmin, _rmax) = (c.next_f32(), c.next_f32());
                    let curve = &self.curves[c.addr()];
                    mem[o] = curve.sample(mem[a]);
                }
                NodeKind::Noise2D => {
                    let (x, y, o) = (c.addr(), c.addr(), c.addr());
                    let noise = &self.noises[c.addr()];
                    mem[o] = noise.sample_2d(mem[x], mem[y]);
                }
                NodeKind::Noise3D => {
                    let (x, y, z, o) = (c.addr(), c.addr(), c.addr(), c.addr());
                    let noise = &self.noises[c.addr()];
                    mem[o] = noise.sample_3d(mem[x], mem[y], mem[z]);
                }
                NodeKind::Image2D => {
                    let (x, y, o) = (c.addr(), c.addr(), c.addr());
                    let (_rmin, _rmax) = (c.next_f32(), c.next_f32());
                    let image = &self.images[c.addr()];
                    mem[o] = image.pixel_red(mem[x].floor() as i32, mem[y].floor() as i32);
                }
            }
        }

        mem[half - 1] * self.iso_scale
    }

    // ── Interval evaluation ─────────────────────────────────────────

    /// Range of the SDF over the axis-aligned box `[box_min, box_max]`.
    ///
    /// Sound outer bound: every position inside the box evaluates within the
    /// returned interval.
    pub fn analyze_range(
        &self,
        scratch: &mut EvalScratch,
        box_min: (f32, f32, f32),
        box_max: (f32, f32, f32),
    ) -> Interval {
        debug_assert_eq!(scratch.mem.len(), self.memory_template.len());
        let half = self.memory_template.len() / 2;
        let (lo_mem, hi_mem) = scratch.mem.split_at_mut(half);
        lo_mem[0] = box_min.0;
        lo_mem[1] = box_min.1;
        lo_mem[2] = box_min.2;
        hi_mem[0] = box_max.0;
        hi_mem[1] = box_max.1;
        hi_mem[2] = box_max.2;

        fn read(lo: &[f32], hi: &[f32], a: usize) -> Interval {
            Interval::new(lo[a], hi[a])
        }
        fn write(lo: &mut [f32], hi: &mut [f32], a: usize, r: Interval) {
            lo[a] = r.lo;
            hi[a] = r.hi;
        }

        let mut c = Cursor::new(&self.bytecode);
        while !c.done() {
            let op = decode_opcode(c.next_u8());
            match op {
                NodeKind::Constant
                | NodeKind::InputX
                | NodeKind::InputY
                | NodeKind::InputZ
                | NodeKind::OutputSdf => {
                    panic!("structural opcode {:?} in compiled program", op)
                }

                NodeKind::Add => {
                    let (a, b, o) = (c.addr(), c.addr(), c.addr());
                    let r = read(lo_mem, hi_mem, a) + read(lo_mem, hi_mem, b);
                    write(lo_mem, hi_mem, o, r);
                }
                NodeKind::Subtract => {
                    let (a, b, o) = (c.addr(), c.addr(), c.addr());
                    let r = read(lo_mem, hi_mem, a) - read(lo_mem, hi_mem, b);
                    write(lo_mem, hi_mem, o, r);
                }
                NodeKind::Multiply => {
                    let (a, b, o) = (c.addr(), c.addr(), c.addr());
                    let r = read(lo_mem, hi_mem, a) * read(lo_mem, hi_mem, b);
                    write(lo_mem, hi_mem, o, r);
                }
                NodeKind::Sine => {
                    let (a, o) = (c.addr(), c.addr());
                    let r = interval::sin_pi(read(lo_mem, hi_mem, a));
                    write(lo_mem, hi_mem, o, r);
                }
                NodeKind::Floor => {
                    let (a, o) = (c.addr(), c.addr());
                    let r = read(lo_mem, hi_mem, a).floor();
                    write(lo_mem, hi_mem, o, r);
                }
                NodeKind::Abs => {
                    let (a, o) = (c.addr(), c.addr());
                    let r = read(lo_mem, hi_mem, a).abs();
                    write(lo_mem, hi_mem, o, r);
                }
                NodeKind::Sqrt => {
                    let (a, o) = (c.addr(), c.addr());
                    let r = read(lo_mem, hi_mem, a).sqrt();
                    write(lo_mem, hi_mem, o, r);
                }
                NodeKind::Distance2D => {
                    let (x0, y0, x1, y1, o) = (c.addr(), c.addr(), c.addr(), c.addr(), c.addr());
                    let dx = read(lo_mem, hi_mem, x1) - read(lo_mem, hi_mem, x0);
                    let dy = read(lo_mem, hi_mem, y1) - read(lo_mem, hi_mem, y0);
                    let r = (dx * dx + dy * dy).sqrt();
                    write(lo_mem, hi_mem, o, r);
                }
                NodeKind::Distance3D => {
                    let (x0, y0, z0) = (c.addr(), c.addr(), c.addr());
                    let (x1, y1, z1, o) = (c.addr(), c.addr(), c.addr(), c.addr());
                    let dx = read(lo_mem, hi_mem, x1) - read(lo_mem, hi_mem, x0);
                    let dy = read(lo_mem, hi_mem, y1) - read(lo_mem, hi_mem, y0);
                    let dz = read(lo_mem, hi_mem, z1) - read(lo_mem, hi_mem, z0);
                    let r = (dx * dx + dy * dy + dz * dz).sqrt();
                    write(lo_mem, hi_mem, o, r);
                }
                NodeKind::Clamp => {
                    let (a, o) = (c.addr(), c.addr());
                    let (min, max) = (c.next_f32(), c.next_f32());
                    let r = read(lo_mem, hi_mem, a).clamp_to(min, max);
                    write(lo_mem, hi_mem, o, r);
                }
                NodeKind::Mix => {
                    let (a, b, t, o) = (c.addr(), c.addr(), c.addr(), c.addr());
                    let r = interval::lerp(
                        read(lo_mem, hi_mem, a),
                        read(lo_mem, hi_mem, b),
                        read(lo_mem, hi_mem, t),
                    );
                    write(lo_mem, hi_mem, o, r);
                }
                NodeKind::Remap => {
                    let (a, o) = (c.addr(), c.addr());
                    let (c0, m0, c1, m1) =
                        (c.next_f32(), c.next_f32(), c.next_f32(), c.next_f32());
                    let r = ((read(lo_mem, hi_mem, a) + c0) * m0) * m1 + c1;
                    write(lo_mem, hi_mem, o, r);
                }
                NodeKind::Curve => {
                    let (a, o) = (c.addr(), c.addr());
                    let monotonic = c.next_u8() != 0;
                    let (rmin, rmax) = (c.next_f32(), c.next_f32());
                    let curve = &self.curves[c.addr()];
                    let x = read(lo_mem, hi_mem, a);
                    let r = if x.is_single_value() {
                        Interval::from_single_value(curve.sample(x.lo))
                    } else if monotonic {
                        Interval::new(curve.sample(x.lo), curve.sample(x.hi))
                    } else {
                        // Non-monotonic over a real interval: fall back to
                        // the whole baked range.
                        Interval::new(rmin, rmax)
                    };
                    write(lo_mem, hi_mem, o, r);
                }
                NodeKind::Noise2D => {
                    let (x, y, o) = (c.addr(), c.addr(), c.addr());
                    let noise = &self.noises[c.addr()];
                    let r = noise.range_2d(read(lo_mem, hi_mem, x), read(lo_mem, hi_mem, y));
                    write(lo_mem, hi_mem, o, r);
                }
                NodeKind::Noise3D => {
                    let (x, y, z, o) = (c.addr(), c.addr(), c.addr(), c.addr());
                    let noise = &self.noises[c.addr()];
                    let r = noise.range_3d(
                        read(lo_mem, hi_mem, x),
                        read(lo_mem, hi_mem, y),
                        read(lo_mem, hi_mem, z),
                    );
                    write(lo_mem, hi_mem, o, r);
                }
                NodeKind::Image2D => {
                    let (_x, _y, o) = (c.addr(), c.addr(), c.addr());
                    let (rmin, rmax) = (c.next_f32(), c.next_f32());
                    let _image = &self.images[c.addr()];
                    // No spatial refinement; the whole image range is sound.
                    write(lo_mem, hi_mem, o, Interval::new(rmin, rmax));
                }
            }
        }

        Interval::new(lo_mem[half - 1], hi_mem[half - 1]) * self.iso_scale
    }

    // ── Validation ──────────────────────────────────────────────────

    /// Structural check of the instruction stream: opcodes must be runtime
    /// kinds, operand addresses must fit the first memory half, and every
    /// read of an intermediate slot must come after the instruction writing
    /// it. Used by tests; evaluation assumes all of this holds.
    pub fn validate(&self) -> Result<(), String> {
        let half = self.memory_template.len() / 2;
        let decoded = self.decode_operands()?;

        // Slots written by some instruction are intermediates; everything
        // else (x/y/z, constants, defaulted inputs) is pre-initialized.
        let mut is_intermediate: Vec<bool> = vec![false; half];
        for (_, _, writes) in &decoded {
            for &w in writes {
                if w >= half {
                    return Err(format!("write address {} out of range {}", w, half));
                }
                is_intermediate[w] = true;
            }
        }

        let mut written: Vec<bool> = vec![false; half];
        for (idx, (op, reads, writes)) in decoded.iter().enumerate() {
            for &r in reads {
                if r >= half {
                    return Err(format!("read address {} out of range {}", r, half));
                }
                if is_intermediate[r] && !written[r] {
                    return Err(format!(
                        "instruction {} ({:?}) reads slot {} before it is written",
                        idx, op, r
                    ));
                }
            }
            for &w in writes {
                written[w] = true;
            }
        }
        Ok(())
    }

    /// Decode `(opcode, input slots, output slots)` per instruction.
    fn decode_operands(&self) -> Result<Vec<(NodeKind, Vec<usize>, Vec<usize>)>, String> {
        let mut out = Vec::new();
        let mut c = Cursor::new(&self.bytecode);
        while !c.done() {
            let byte = c.next_u8();
            let op = NodeKind::from_u8(byte).ok_or_else(|| format!("unknown opcode {}", byte))?;
            if op.is_structural() {
                return Err(format!("structural opcode {:?} in bytecode", op));
            }
            let info = op.info();
            let reads: Vec<usize> = (0..info.inputs.len()).map(|_| c.addr()).collect();
            let writes: Vec<usize> = (0..info.outputs.len()).map(|_| c.addr()).collect();
            // Skip the payload
            match op {
                NodeKind::Clamp => {
                    c.next_f32();
                    c.next_f32();
                }
                NodeKind::Remap => {
                    for _ in 0..4 {
                        c.next_f32();
                    }
                }
                NodeKind::Curve => {
                    c.next_u8();
                    c.next_f32();
                    c.next_f32();
                    c.addr();
                }
                NodeKind::Image2D => {
                    c.next_f32();
                    c.next_f32();
                    c.addr();
                }
                NodeKind::Noise2D | NodeKind::Noise3D => {
                    c.addr();
                }
                _ => {}
            }
            out.push((op, reads, writes));
        }
        Ok(out)
    }
}

#[inline]
fn decode_opcode(byte: u8) -> NodeKind {
    match NodeKind::from_u8(byte) {
        Some(op) => op,
        None => panic!("unknown opcode {} in compiled program", byte),
    }
}
