//! # Low-Level Netlink Interface
//!
//! ## Purpose
//!
//! Queries the Linux kernel's networking subsystem via a `NETLINK_ROUTE`
//! socket, for the sole purpose of listing interfaces by name so a CLI
//! or test harness can resolve a name to an index. Route and neighbor
//! queries are not needed here: this crate never builds a routing
//! table, it only looks interfaces up.
//!
//! ## Main components
//!
//! - `netlink()`: a generic function for the netlink request/response
//!   message loop.
//! - `get_links()`: the one public query this crate needs.
//! - `Link`: the interface record returned from the kernel.

use netlink_packet_core::{
    NLM_F_DUMP, NLM_F_REQUEST, NetlinkDeserializable, NetlinkMessage, NetlinkPayload,
    NetlinkSerializable,
};
use netlink_packet_route::{
    RouteNetlinkMessage,
    link::{LinkAttribute, LinkMessage},
};
use netlink_sys::{Socket, SocketAddr};
use std::io;

/// A network interface as reported by the kernel's link table.
#[derive(Clone, Debug, Default)]
pub struct Link {
    /// The interface index.
    pub if_index: u32,
    /// The interface name (e.g. "eth0").
    pub name: String,
    /// The Maximum Transmission Unit of the interface.
    pub mtu: u32,
    /// The MAC address of the interface.
    pub mac: [u8; 6],
}

/// A generic function to send a netlink request and parse the response.
///
/// Opens a `NETLINK_ROUTE` socket, sends the serialized request, and
/// feeds each message in the (possibly multi-part) kernel response to
/// `f`, collecting whatever it returns.
pub fn netlink<T, F, R>(mut req: NetlinkMessage<T>, f: F) -> Result<Vec<R>, io::Error>
where
    T: NetlinkSerializable + NetlinkDeserializable,
    F: Fn(NetlinkMessage<T>) -> Result<Option<R>, io::Error>,
{
    let mut socket = Socket::new(netlink_sys::constants::NETLINK_ROUTE)?;
    let kernel_addr = SocketAddr::new(0, 0);
    socket.bind(&kernel_addr)?;
    req.header.flags = NLM_F_REQUEST | NLM_F_DUMP;
    let mut send_buf = vec![0u8; req.buffer_len()];
    req.finalize();
    req.serialize(&mut send_buf);
    if socket.send(send_buf.as_slice(), 0)? != send_buf.len() {
        return Err(io::Error::other("failed to send netlink request"));
    };

    let (recv_buf, _) = socket.recv_from_full()?;
    let mut buffer_view = &recv_buf[..];
    let mut result = Vec::new();
    while !buffer_view.is_empty() {
        let msg = NetlinkMessage::<T>::deserialize(buffer_view).map_err(io::Error::other)?;
        let len = msg.header.length as usize;
        if let Some(r) = f(msg)? {
            result.push(r);
        }
        if len == 0 || len > buffer_view.len() {
            return Err(io::Error::other("malformed netlink message length"));
        }
        buffer_view = &buffer_view[len..];
    }
    Ok(result)
}

/// Retrieves a list of all network interfaces (links) from the kernel.
pub fn get_links() -> Result<Vec<Link>, io::Error> {
    let req_msg = LinkMessage::default();
    let req = NetlinkMessage::from(RouteNetlinkMessage::GetLink(req_msg));
    netlink(req, |msg| match msg.payload {
        NetlinkPayload::InnerMessage(RouteNetlinkMessage::NewLink(ref link_msg)) => {
            let mut link = Link {
                if_index: link_msg.header.index,
                ..Default::default()
            };
            for attr in link_msg.attributes.iter() {
                match attr {
                    LinkAttribute::IfName(name) => {
                        link.name = name.to_string();
                    }
                    LinkAttribute::Mtu(mtu) => {
                        link.mtu = *mtu;
                    }
                    LinkAttribute::Address(mac) => {
                        if mac.len() == 6 {
                            link.mac = mac[0..6]
                                .try_into()
                                .map_err(|_| io::Error::from(io::ErrorKind::InvalidData))?;
                        } else {
                            return Ok(None);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Some(link))
        }
        _ => Ok(None),
    })
}
