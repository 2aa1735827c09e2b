//! Peripheral register tests.
//!
//! Drives the LED latches and the polling UART block through the assembled
//! machine's bus, including the access-kind faults the memory map enforces.

use crate::common::TestContext;
use armsim_core::common::{Fault, Stage};
use armsim_core::config::Config;
use armsim_core::core::state::flags;
use armsim_core::soc::devices::{leds, uart};
use pretty_assertions::assert_eq;

fn led_base() -> u32 {
    Config::default().memory.led_base
}

fn uart_base() -> u32 {
    Config::default().memory.uart_base
}

// ══════════════════════════════════════════════════════════
// 1. LED latches
// ══════════════════════════════════════════════════════════

#[test]
fn led_write_latches_and_reads_back() {
    let mut ctx = TestContext::inline();
    let base = led_base();
    ctx.machine
        .write_word(Stage::Execute, base + 4, 0xA5)
        .unwrap();
    assert_eq!(ctx.machine.led(leds::GREEN), 0xA5);
    assert_eq!(ctx.machine.read_word(base + 4).unwrap(), 0xA5);
    assert_eq!(ctx.machine.led(leds::RED), 0);
}

#[test]
fn led_write_raises_the_per_cycle_flag() {
    let mut ctx = TestContext::inline();
    let base = led_base();
    ctx.machine.log.begin_cycle();
    assert!(!ctx.machine.log.flag_set(flags::LED_WRITTEN));
    ctx.machine
        .write_word(Stage::Execute, base, 0xFF)
        .unwrap();
    assert!(ctx.machine.log.flag_set(flags::LED_WRITTEN));
    ctx.machine.tock().unwrap();
}

// ══════════════════════════════════════════════════════════
// 2. UART registers
// ══════════════════════════════════════════════════════════

#[test]
fn uart_status_reports_no_rx_and_busy_tx_when_idle() {
    let mut ctx = TestContext::inline();
    let status = ctx.machine.read_word(uart_base()).unwrap();
    assert_eq!(status & uart::STATUS_RX_AVAIL, 0);
    // No bridge client is connected, so transmit reads busy.
    assert_eq!(status & uart::STATUS_TX_BUSY, uart::STATUS_TX_BUSY);
}

#[test]
fn uart_rxdata_is_read_only_and_txdata_write_only() {
    let mut ctx = TestContext::inline();
    let base = uart_base();
    let err = ctx
        .machine
        .write_word(Stage::Execute, base + 4, 0x41)
        .unwrap_err();
    assert!(matches!(err, Fault::ReadOnly { .. }), "{err}");
    let err = ctx.machine.read_word(base + 8).unwrap_err();
    assert!(matches!(err, Fault::WriteOnly { .. }), "{err}");
}

#[test]
fn uart_tx_without_a_client_is_dropped_silently() {
    let mut ctx = TestContext::inline();
    ctx.machine
        .write_word(Stage::Execute, uart_base() + 8, 0x41)
        .unwrap();
    // Dropped transmits are not I/O; history stays rewindable.
    assert!(!ctx.machine.log.flag_set(flags::IO_BARRIER));
}

#[test]
fn uart_empty_rx_read_does_not_underflow() {
    let mut ctx = TestContext::inline();
    let byte = ctx.machine.read_word(uart_base() + 4).unwrap();
    assert_eq!(byte, 0);
}
