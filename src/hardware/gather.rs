//! The DMA gather chain on the hardware registers.
use super::{read_register, write_register};
use crate::{
    design_parameters::memory_map::{DMA_INTE0, DMA_INTS0, PIO0_RXF0},
    dma::{enable_interrupt, is_busy, ControlBlocks, Dreq, Topology},
    pipeline::Gather,
};

pub struct DmaGather {
    topology: Topology<'static>,
    blocks: u32,
}

impl DmaGather {
    /// Program the chain and enable its completion interrupt.
    ///
    /// The trigger channel starts waiting for the PIO immediately.
    pub fn start(topology: Topology<'static>, blocks: &'static ControlBlocks) -> Self {
        let blocks = blocks.address();
        for write in topology.program(blocks, PIO0_RXF0, Dreq::PioRx { pio: 0, sm: 0 }) {
            unsafe { write_register(write.address, write.value) };
        }
        let inte0 = enable_interrupt(unsafe { read_register(DMA_INTE0) }, topology.interrupt_mask());
        unsafe { write_register(inte0.address, inte0.value) };
        log::info!(
            "DMA gather armed: trigger {}, control {}, gather {}",
            topology.trigger.index(),
            topology.control.index(),
            topology.gather.index()
        );
        Self { topology, blocks }
    }
}

impl Gather for DmaGather {
    fn acknowledge(&mut self) {
        // Write one to clear
        unsafe { write_register(DMA_INTS0, self.topology.interrupt_mask()) };
    }

    fn busy(&self) -> bool {
        is_busy(unsafe { read_register(self.topology.busy_register()) })
    }

    fn rearm(&mut self) {
        let write = self.topology.rearm(self.blocks);
        unsafe { write_register(write.address, write.value) };
    }
}
