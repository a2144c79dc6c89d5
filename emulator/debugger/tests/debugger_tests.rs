use std::cell::RefCell;
use std::rc::Rc;

use zeta_core::{Memory, Signal};
use zeta_z80::Z80;

use zeta_debugger::{
    Breakpoint, BreakpointObserver, BreakpointSet, ChangeWidth, CharacterEncoding, DebuggerError, DisplayBase, IntegerWidth,
    MemoryWatch, Runner, StopReason, WatchByteOrder,
};

struct RecordingObserver {
    id: usize,
    log: Rc<RefCell<Vec<usize>>>,
}

impl BreakpointObserver for RecordingObserver {
    fn notify(&self, _breakpoint: &Breakpoint) {
        self.log.borrow_mut().push(self.id);
    }
}

fn observer(id: usize, log: &Rc<RefCell<Vec<usize>>>) -> Rc<dyn BreakpointObserver> {
    Rc::new(RecordingObserver {
        id,
        log: Rc::clone(log),
    })
}

#[test]
fn memory_changed_breakpoint_never_fires_on_the_first_check() {
    let mut memory = Memory::new();
    let mut breakpoints = BreakpointSet::default();
    let state = Z80::default().state;

    let handle = breakpoints
        .add(Breakpoint::MemoryChanged {
            address: 0x4000,
            width: ChangeWidth::Byte,
        })
        .unwrap();

    let log = Rc::new(RefCell::new(Vec::new()));
    let first = observer(1, &log);
    let second = observer(2, &log);
    breakpoints.add_observer(handle, &first);
    breakpoints.add_observer(handle, &second);

    // first check only records the initial value
    assert!(breakpoints.check_all(&state, &memory).is_empty());

    // rewriting the same value is not a change
    memory.write_byte(0x4000, 0x00);
    assert!(breakpoints.check_all(&state, &memory).is_empty());

    // a distinct value fires exactly once, observers in registration order
    memory.write_byte(0x4000, 0x01);
    assert_eq!(breakpoints.check_all(&state, &memory), vec![handle]);
    assert_eq!(*log.borrow(), vec![1, 2]);

    // no further change, no further firing
    assert!(breakpoints.check_all(&state, &memory).is_empty());
}

#[test]
fn memory_changed_watches_words_in_z80_byte_order() {
    let mut memory = Memory::new();
    let mut breakpoints = BreakpointSet::default();
    let state = Z80::default().state;

    let handle = breakpoints
        .add(Breakpoint::MemoryChanged {
            address: 0x4000,
            width: ChangeWidth::Word,
        })
        .unwrap();

    breakpoints.check_all(&state, &memory);
    memory.write_byte(0x4001, 0x12); // high byte of the watched word
    assert_eq!(breakpoints.check_all(&state, &memory), vec![handle]);
}

#[test]
fn disabled_breakpoints_never_notify() {
    let memory = Memory::new();
    let mut breakpoints = BreakpointSet::default();
    let mut state = Z80::default().state;
    state.pc = 0x1234;

    let handle = breakpoints
        .add(Breakpoint::ProgramCounter {
            address: 0x1234,
        })
        .unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    let obs = observer(1, &log);
    breakpoints.add_observer(handle, &obs);

    breakpoints.disable(handle);
    assert!(breakpoints.check_all(&state, &memory).is_empty());
    assert!(log.borrow().is_empty());

    breakpoints.enable(handle);
    assert_eq!(breakpoints.check_all(&state, &memory), vec![handle]);
    assert_eq!(*log.borrow(), vec![1]);
}

#[test]
fn dropped_observers_are_pruned_not_notified() {
    let memory = Memory::new();
    let mut breakpoints = BreakpointSet::default();
    let mut state = Z80::default().state;
    state.sp = 0x3FFF;

    let handle = breakpoints
        .add(Breakpoint::StackPointerBelow {
            address: 0x4000,
        })
        .unwrap();

    let log = Rc::new(RefCell::new(Vec::new()));
    let keep = observer(1, &log);
    let dropped = observer(2, &log);
    breakpoints.add_observer(handle, &dropped);
    breakpoints.add_observer(handle, &keep);
    drop(dropped);

    assert_eq!(breakpoints.check_all(&state, &memory), vec![handle]);
    assert_eq!(*log.borrow(), vec![1]);
}

#[test]
fn removing_an_observer_stops_its_notifications() {
    let memory = Memory::new();
    let mut breakpoints = BreakpointSet::default();
    let mut state = Z80::default().state;
    state.pc = 0x2000;

    let handle = breakpoints
        .add(Breakpoint::ProgramCounter {
            address: 0x2000,
        })
        .unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    let obs = observer(7, &log);
    breakpoints.add_observer(handle, &obs);
    assert!(breakpoints.remove_observer(handle, &obs));

    breakpoints.check_all(&state, &memory);
    assert!(log.borrow().is_empty());
}

#[test]
fn breakpoint_equality_is_structural() {
    let a = Breakpoint::MemoryChanged {
        address: 0x4000,
        width: ChangeWidth::Word,
    };
    let b = Breakpoint::MemoryChanged {
        address: 0x4000,
        width: ChangeWidth::Word,
    };
    let c = Breakpoint::MemoryChanged {
        address: 0x4000,
        width: ChangeWidth::Long,
    };
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_ne!(
        Breakpoint::ProgramCounter {
            address: 0x4000
        },
        Breakpoint::StackPointerBelow {
            address: 0x4000
        }
    );

    let mut breakpoints = BreakpointSet::default();
    breakpoints.add(a).unwrap();
    assert!(breakpoints.contains(&b));
    assert!(!breakpoints.contains(&c));
}

#[test]
fn breakpoints_past_the_end_of_memory_are_rejected() {
    let mut breakpoints = BreakpointSet::default();
    let result = breakpoints.add(Breakpoint::MemoryChanged {
        address: 0xFFFF,
        width: ChangeWidth::Word,
    });
    assert_eq!(
        result,
        Err(DebuggerError::InvalidAddress {
            address: 0xFFFF,
            size: 2,
        })
    );

    // a PC breakpoint has no width to run over the end
    assert!(breakpoints
        .add(Breakpoint::ProgramCounter {
            address: 0xFFFF
        })
        .is_ok());
}

#[test]
fn breakpoint_descriptions_name_the_condition() {
    let bp = Breakpoint::MemoryChanged {
        address: 0x4000,
        width: ChangeWidth::Word,
    };
    assert_eq!(bp.type_name(), "Memory value change");
    assert_eq!(bp.condition_description(), "16-bit value at address 0x4000 changes");

    let bp = Breakpoint::StackPointerBelow {
        address: 0x8000,
    };
    assert_eq!(bp.condition_description(), "SP < 0x8000");
}

fn watch_value(memory: &Memory, watch: MemoryWatch) -> String {
    watch.display_value(memory)
}

#[test]
fn integer_watches_render_in_every_base() {
    let mut memory = Memory::new();
    memory.load_at(0x4000, &[0x34, 0x12]);

    let le = |base| MemoryWatch::Integer {
        address: 0x4000,
        width: IntegerWidth::I16,
        base,
        byte_order: WatchByteOrder::LittleEndian,
    };

    assert_eq!(watch_value(&memory, le(DisplayBase::Decimal)), "4660");
    assert_eq!(watch_value(&memory, le(DisplayBase::Hexadecimal)), "0x1234");
    assert_eq!(watch_value(&memory, le(DisplayBase::Octal)), "011064");
    assert_eq!(watch_value(&memory, le(DisplayBase::Binary)), "0b1001000110100");

    let be = MemoryWatch::Integer {
        address: 0x4000,
        width: IntegerWidth::I16,
        base: DisplayBase::Hexadecimal,
        byte_order: WatchByteOrder::BigEndian,
    };
    assert_eq!(watch_value(&memory, be), "0x3412");
}

#[test]
fn hex_rendering_pads_to_the_watch_width() {
    let mut memory = Memory::new();
    memory.write_byte(0x4000, 0x05);

    let watch = MemoryWatch::Integer {
        address: 0x4000,
        width: IntegerWidth::I32,
        base: DisplayBase::Hexadecimal,
        byte_order: WatchByteOrder::LittleEndian,
    };
    assert_eq!(watch.display_value(&memory), "0x00000005");
}

#[test]
fn sixteen_byte_watches_fall_back_to_hex() {
    let mut memory = Memory::new();
    let data: Vec<u8> = (0x00..0x10).collect();
    memory.load_at(0x2000, &data);

    let watch = MemoryWatch::Integer {
        address: 0x2000,
        width: IntegerWidth::I128,
        base: DisplayBase::Decimal, // ignored; bigints are hex-only
        byte_order: WatchByteOrder::LittleEndian,
    };
    assert_eq!(watch.display_value(&memory), "0x0f0e0d0c0b0a09080706050403020100");

    let watch = MemoryWatch::Integer {
        address: 0x2000,
        width: IntegerWidth::I128,
        base: DisplayBase::Hexadecimal,
        byte_order: WatchByteOrder::BigEndian,
    };
    assert_eq!(watch.display_value(&memory), "0x000102030405060708090a0b0c0d0e0f");
}

#[test]
fn ascii_watches_replace_high_bytes() {
    let mut memory = Memory::new();
    memory.load_at(0x5000, b"HELLO");
    memory.write_byte(0x5005, 0xC8);

    let watch = MemoryWatch::String {
        address: 0x5000,
        length: 6,
        encoding: CharacterEncoding::Ascii,
    };
    assert_eq!(watch.display_value(&memory), "HELLO\u{FFFD}");
}

#[test]
fn spectrum_watches_transcode_the_rom_character_set() {
    let mut memory = Memory::new();
    memory.load_at(0x5000, &[0x60, 0x7F, 0x41, 0x80, 0x8F, 0xA5, 0xFF, 0x0C, 0x0D, 0x05]);

    let watch = MemoryWatch::String {
        address: 0x5000,
        length: 10,
        encoding: CharacterEncoding::Spectrum,
    };
    assert_eq!(
        watch.display_value(&memory),
        "\u{00A3}\u{00A9}A \u{2588}[RND][COPY]\u{232B}\u{23CE}\u{FFFD}"
    );
}

#[test]
fn watch_type_names_describe_width_and_length() {
    let watch = MemoryWatch::Integer {
        address: 0,
        width: IntegerWidth::I32,
        base: DisplayBase::Decimal,
        byte_order: WatchByteOrder::LittleEndian,
    };
    assert_eq!(watch.type_name(), "Int [32]");

    let watch = MemoryWatch::String {
        address: 0,
        length: 12,
        encoding: CharacterEncoding::Spectrum,
    };
    assert_eq!(watch.type_name(), "String [12]");
}

#[test]
fn watches_past_the_end_of_memory_are_rejected() {
    let mut cpu_memory = Memory::new();
    let cpu = Z80::default();
    let mut runner = Runner::new(cpu, &mut cpu_memory);

    let result = runner.watches.add(MemoryWatch::String {
        address: 0xFFF0,
        length: 0x20,
        encoding: CharacterEncoding::Ascii,
    });
    assert_eq!(
        result,
        Err(DebuggerError::InvalidAddress {
            address: 0xFFF0,
            size: 0x20,
        })
    );

    // a watch that ends exactly at the boundary is fine
    assert!(runner
        .watches
        .add(MemoryWatch::String {
            address: 0xFFF0,
            length: 0x10,
            encoding: CharacterEncoding::Ascii,
        })
        .is_ok());
}

#[test]
fn runner_stops_on_a_pc_breakpoint() {
    let mut memory = Memory::new();
    // a handful of NOPs and then a jump back to the start
    memory.load_at(0, &[0x00, 0x00, 0x00, 0xC3, 0x00, 0x00]);
    let mut runner = Runner::new(Z80::default(), &mut memory);

    let handle = runner
        .breakpoints
        .add(Breakpoint::ProgramCounter {
            address: 0x0003,
        })
        .unwrap();

    assert_eq!(runner.run(), StopReason::Breakpoint(handle));
    assert_eq!(runner.registers().pc, 0x0003);
}

#[test]
fn runner_observes_the_pause_line_at_instruction_boundaries() {
    struct Pauser {
        pause: Signal<bool>,
    }

    impl BreakpointObserver for Pauser {
        fn notify(&self, _breakpoint: &Breakpoint) {
            self.pause.set(true);
        }
    }

    let mut memory = Memory::new();
    memory.load_at(0, &[0x00, 0x00, 0xC3, 0x00, 0x00]); // spin forever
    let mut runner = Runner::new(Z80::default(), &mut memory);

    // an observer raises the pause line when its breakpoint fires; the run
    // reports the breakpoint, and the latched pause holds the next run
    let handle = runner
        .breakpoints
        .add(Breakpoint::ProgramCounter {
            address: 0x0002,
        })
        .unwrap();
    let pauser: Rc<dyn BreakpointObserver> = Rc::new(Pauser {
        pause: runner.pause_signal(),
    });
    runner.breakpoints.add_observer(handle, &pauser);

    assert_eq!(runner.run(), StopReason::Breakpoint(handle));
    assert_eq!(runner.run(), StopReason::Paused);
    assert_eq!(runner.registers().pc, 0x0002);
}

#[test]
fn runner_reports_a_reset_request_without_acting_on_it() {
    let mut memory = Memory::new();
    memory.load_at(0, &[0xC3, 0x00, 0x00]);
    let mut runner = Runner::new(Z80::default(), &mut memory);

    let reset = runner.reset_signal();
    reset.signal();
    assert_eq!(runner.run(), StopReason::Reset);

    runner.reset();
    assert_eq!(runner.registers().pc, 0x0000);
    assert_eq!(runner.registers().sp, 0xFFFF);
    assert_eq!(runner.cpu.tstates, 0);
}

#[test]
fn runner_steps_and_serves_the_debugger_ui() {
    let mut memory = Memory::new();
    memory.load_at(0, &[0x3E, 0x42, 0x32, 0x00, 0x50]); // LD A,0x42 / LD (0x5000),A
    let mut runner = Runner::new(Z80::default(), &mut memory);

    runner.step();
    runner.step();

    assert_eq!(runner.registers().pc, 0x0005);
    assert_eq!(runner.read_bytes(0x5000, 1), vec![0x42]);

    let listing = runner.disassemble(0x0000, 2);
    assert_eq!(listing[0].1.to_string(), "LD A, 0x42");
    assert_eq!(listing[1].1.to_string(), "LD (0x5000), A");
}

#[test]
fn runner_renders_watch_values_live() {
    let mut memory = Memory::new();
    memory.load_at(0, &[0x3E, 0x42, 0x32, 0x00, 0x50]);
    let mut runner = Runner::new(Z80::default(), &mut memory);

    let handle = runner
        .watches
        .add(MemoryWatch::Integer {
            address: 0x5000,
            width: IntegerWidth::I8,
            base: DisplayBase::Hexadecimal,
            byte_order: WatchByteOrder::LittleEndian,
        })
        .unwrap();

    assert_eq!(runner.watch_values(), vec![(handle, "0x00".to_string())]);

    runner.step();
    runner.step();
    assert_eq!(runner.watch_values(), vec![(handle, "0x42".to_string())]);
}

#[test]
fn history_records_instructions_with_surrounding_state() {
    let mut memory = Memory::new();
    memory.load_at(0, &[0x3E, 0x42, 0x3C]); // LD A,0x42 / INC A
    let mut runner = Runner::new(Z80::default(), &mut memory);
    runner.enable_history();

    runner.step();
    runner.step();

    let history = runner.history().unwrap();
    assert_eq!(history.len(), 2);

    let last = history.newest().unwrap();
    assert_eq!(last.pc, 0x0002);
    assert_eq!(last.state_before.reg[6], 0x42); // A before INC
    assert_eq!(last.state_after.reg[6], 0x43);

    let first = history.oldest().unwrap();
    assert_eq!(first.pc, 0x0000);
}

#[test]
fn stack_pointer_breakpoint_catches_a_deep_push() {
    let mut memory = Memory::new();
    memory.load_at(0, &[0xC5, 0xC5, 0xC5]); // PUSH BC x3
    let mut cpu = Z80::default();
    cpu.state.sp = 0x8004;
    let mut runner = Runner::new(cpu, &mut memory);

    let handle = runner
        .breakpoints
        .add(Breakpoint::StackPointerBelow {
            address: 0x8001,
        })
        .unwrap();

    assert_eq!(runner.run(), StopReason::Breakpoint(handle));
    assert_eq!(runner.registers().sp, 0x8000);
}
