//! Mounts the vendor interface of a device, sends a payload and prints the reply.

use rvendor::{descriptor, LibusbTransport, TransferResult, VendorHost};
use std::{error, process, str::FromStr, time::Duration};
use structopt::StructOpt;

const SLOT: u8 = 1;

struct UsbIds {
    vid: u16,
    pid: u16,
}

impl FromStr for UsbIds {
    type Err = Box<dyn error::Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &*s.split(':').collect::<Vec<_>>() {
            [vid, pid] => {
                let (vid, pid) = (u16::from_str_radix(vid, 16)?, u16::from_str_radix(pid, 16)?);
                Ok(Self { vid, pid })
            }
            _ => Err("USB ID format: `vid:pid`".into()),
        }
    }
}

#[derive(StructOpt)]
struct Opts {
    /// VID:PID of the device to talk to.
    #[structopt(short = "d")]
    id: UsbIds,

    /// Text to send over the bulk OUT endpoint.
    #[structopt(long, default_value = "ping")]
    payload: String,

    /// Number of Bytes to request from the bulk IN endpoint.
    #[structopt(long, default_value = "64")]
    read_len: usize,

    /// USB timeout in milliseconds.
    #[structopt(long, default_value = "1000")]
    timeout: u64,
}

fn main() {
    match run() {
        Ok(()) => {}
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

fn run() -> Result<(), Box<dyn error::Error>> {
    env_logger::init();
    let opts: Opts = Opts::from_args();
    let UsbIds { vid, pid } = opts.id;

    let mut transport = LibusbTransport::new();
    transport.set_timeout(Duration::from_millis(opts.timeout));
    transport.attach_by_id(SLOT, vid, pid)?;
    let config = transport.read_config_descriptor(SLOT)?;

    let offset = descriptor::find_vendor_interface(&config)?
        .ok_or("device has no vendor-specific interface")?;
    let intf = descriptor::InterfaceDescriptor::parse(&config[offset..])?;

    let mut host = VendorHost::new(transport);
    host.init();
    let consumed = host.open(SLOT, &config[offset..])?;
    println!(
        "mounted interface {} ({} descriptor bytes): {:?}",
        intf.interface_number,
        consumed,
        host.registry().lookup(SLOT),
    );
    if !host.set_config(SLOT, intf.interface_number) {
        return Err("failed to claim interface".into());
    }

    host.write(SLOT, vid, pid, opts.payload.into_bytes())?;
    let sent = complete(&mut host)?;
    println!("sent {} bytes", sent.bytes_transferred);

    host.read(SLOT, vid, pid, vec![0; opts.read_len])?;
    let reply = complete(&mut host)?;
    println!(
        "received {} bytes: {:02x?}",
        reply.bytes_transferred,
        reply.data()
    );

    host.close(SLOT);
    host.transport_mut().detach(SLOT);
    Ok(())
}

/// Waits for the transfer that was just submitted and reports it to the driver.
fn complete(
    host: &mut VendorHost<LibusbTransport>,
) -> Result<rvendor::Completion, Box<dyn error::Error>> {
    let c = host
        .transport_mut()
        .poll_completion()
        .ok_or("transfer did not complete")?;
    host.on_transfer_complete(c.slot, c.endpoint, c.result, c.bytes_transferred);

    match c.result {
        TransferResult::Success => Ok(c),
        other => Err(format!("transfer on {:#04x} failed: {:?}", c.endpoint, other).into()),
    }
}
