/// The value pushed into the RX FIFO on each edge.
///
/// It becomes the transfer count of the DMA control channel: two words, one control block.
pub const TRIGGER_VALUE: u32 = 2;

/// Rising edge detector on `in` pin 0.
///
/// Waits for the pin to go low, then high, and pushes [TRIGGER_VALUE]. Pushing does not
/// block: an edge arriving while the FIFO is full (the DMA chain stalled) is dropped.
pub fn edge_detector() -> pio::Program<32> {
    pio_proc::pio_asm!(
        "set y, 2",
        ".wrap_target",
        "wait 0 pin, 0",
        "wait 1 pin, 0",
        "mov isr, y",
        "push noblock",
        ".wrap",
    )
    .program
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn program() {
        let p = edge_detector();
        assert_eq!(p.code.as_slice(), &[0xe042, 0x2020, 0x20a0, 0xa0c2, 0x8000]);
        assert_eq!((p.wrap.target, p.wrap.source), (1, 4));
        assert_eq!(p.code[0] & 0x1f, TRIGGER_VALUE as u16);
    }
}
