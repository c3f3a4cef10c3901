use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use log::debug;
use types::Errno;
use vm::AddressSpace;

use super::structs::{StructReader, StructWriter};
use super::{efault, Reply, SysResult};
use crate::files::{Access, Descriptor, Kind, Socket, StatusFlags};
use crate::task::Task;

const AF_INET: u32 = 2;
const SOCK_STREAM: u32 = 2;
const SOCK_TYPE_MASK: u32 = 0xf;

impl Task {
    fn load_sockaddr(&self, memory: &AddressSpace, addr: u32, len: u32) -> Result<SocketAddrV4, Errno> {
        let constants = self.registry().constants();
        if len < constants.size_of("sockaddr_in").unwrap_or(16) {
            return Err(Errno::EINVAL);
        }
        let r = StructReader::load(constants, "sockaddr_in", memory, addr)?;
        if r.get("sin_family") as u32 != AF_INET {
            return Err(Errno::EAFNOSUPPORT);
        }
        let ip = Ipv4Addr::from(r.get("sin_addr") as u32);
        Ok(SocketAddrV4::new(ip, r.get("sin_port") as u16))
    }

    pub(super) fn sys_socket(&mut self, domain: u32, kind: u32, _protocol: u32) -> SysResult {
        if domain != AF_INET {
            return Err(Errno::EAFNOSUPPORT);
        }
        if kind & SOCK_TYPE_MASK != SOCK_STREAM {
            return Err(Errno::EPROTONOSUPPORT);
        }
        let desc = Descriptor::new(
            Kind::Socket(Socket::new()),
            Access::READ | Access::WRITE,
            StatusFlags::empty(),
            "socket",
        );
        self.files.insert(desc).map(Reply::Value)
    }

    pub(super) fn sys_bind(&mut self, memory: &mut AddressSpace, fd: u32, addr: u32, len: u32) -> SysResult {
        let desc = self.files.get(fd)?;
        let addr = self.load_sockaddr(memory, addr, len)?;
        desc.socket()?.bind(addr)?;
        Ok(Reply::Value(0))
    }

    pub(super) fn sys_connect(&mut self, memory: &mut AddressSpace, fd: u32, addr: u32, len: u32) -> SysResult {
        let desc = self.files.get(fd)?;
        let addr = self.load_sockaddr(memory, addr, len)?;
        debug!("pid {}: connect {}", self.pid(), addr);
        desc.socket()?.connect(addr)?;
        Ok(Reply::Value(0))
    }

    pub(super) fn sys_listen(&mut self, fd: u32) -> SysResult {
        self.files.get(fd)?.socket()?.listen()?;
        Ok(Reply::Value(0))
    }

    /// Blocks unless the descriptor is nonblocking. The peer address is
    /// written when `addr` is non-null.
    pub(super) fn sys_accept(&mut self, memory: &mut AddressSpace, fd: u32, addr: u32, lenp: u32) -> SysResult {
        let desc = self.files.get(fd)?;
        let nonblocking = desc.status().contains(StatusFlags::NONBLOCK);
        let (socket, peer) = desc.socket()?.accept(nonblocking, &self.signals)?;
        let conn = self.files.insert(Descriptor::new(
            Kind::Socket(socket),
            Access::READ | Access::WRITE,
            StatusFlags::empty(),
            "socket",
        ))?;

        if addr != 0 {
            if let SocketAddr::V4(peer) = peer {
                let constants = self.registry().constants();
                let mut w = StructWriter::new(constants, "sockaddr_in")?;
                w.set("sin_family", AF_INET as u64)
                    .set("sin_port", peer.port() as u64)
                    .set("sin_addr", u32::from(*peer.ip()) as u64);
                w.store(memory, addr)?;
                if lenp != 0 {
                    memory.store_word(lenp, w.bytes().len() as u32).map_err(efault)?;
                }
            }
        }
        Ok(Reply::Value(conn))
    }

    /// Options are accepted and ignored.
    pub(super) fn sys_setsockopt(&mut self, args: [u32; 6]) -> SysResult {
        self.files.get(args[0])?.socket()?;
        Ok(Reply::Value(0))
    }
}
