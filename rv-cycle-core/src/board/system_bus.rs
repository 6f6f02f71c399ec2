use crate::bus::{BusRequest, BusResponse, Memory};
use crate::resources::io::Io;
use crate::resources::ram::Ram;

/// Enum that uniquely identifies every device attached to a [`SystemBus`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub(super) enum Resource {
    #[default]
    Ram,
    Io,
}

/// Interconnect routing each strobe to the RAM or the I/O page.
///
/// Addresses at or above `io_base` select the I/O page, with the base subtracted; everything
/// below goes to the RAM. Every device is cycled on every tick, so that one still working on an
/// access keeps counting down. The response is taken from the device selected by the most recent
/// strobe.
#[derive(Debug)]
pub(super) struct SystemBus {
    pub ram: Ram,
    pub io: Io,
    pub io_base: u32,
    selected: Resource,
}

impl SystemBus {
    pub fn new(ram: Ram, io: Io, io_base: u32) -> Self {
        Self {
            ram,
            io,
            io_base,
            selected: Resource::default(),
        }
    }

    fn resource_of(&self, address: u32) -> Resource {
        if address >= self.io_base {
            Resource::Io
        } else {
            Resource::Ram
        }
    }
}

impl Memory for SystemBus {
    fn cycle(&mut self, request: &BusRequest) -> BusResponse {
        let idle = BusRequest::idle();
        let (ram_request, io_request) = if request.is_idle() {
            (idle, idle)
        } else {
            self.selected = self.resource_of(request.address);
            match self.selected {
                Resource::Ram => (*request, idle),
                Resource::Io => {
                    let mapped = BusRequest {
                        address: request.address - self.io_base,
                        ..*request
                    };
                    (idle, mapped)
                }
            }
        };

        let ram_response = self.ram.cycle(&ram_request);
        let io_response = self.io.cycle(&io_request);
        match self.selected {
            Resource::Ram => ram_response,
            Resource::Io => io_response,
        }
    }

    fn reset(&mut self) {
        self.ram.reset();
        self.io.reset();
        self.selected = Resource::default();
    }
}
