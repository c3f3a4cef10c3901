use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;
use types::Errno;

use crate::signal::Signals;

#[derive(Debug)]
enum State {
    Fresh,
    Bound(SocketAddrV4),
    Listening(TcpListener),
    /// Host stream in nonblocking mode; blocking is done by polling.
    Connected(TcpStream),
}

/// An AF_INET stream socket backed by `std::net`.
#[derive(Debug)]
pub struct Socket {
    state: Mutex<State>,
    /// Connections picked up by a readiness probe before accept asked.
    backlog: Mutex<VecDeque<(TcpStream, SocketAddr)>>,
}

impl Default for Socket {
    fn default() -> Self {
        Self::new()
    }
}

impl Socket {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Fresh),
            backlog: Mutex::new(VecDeque::new()),
        }
    }

    fn connected(stream: TcpStream) -> Result<Self, Errno> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            state: Mutex::new(State::Connected(stream)),
            backlog: Mutex::new(VecDeque::new()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn bind(&self, addr: SocketAddrV4) -> Result<(), Errno> {
        let mut state = self.lock();
        match *state {
            State::Fresh => {
                *state = State::Bound(addr);
                Ok(())
            }
            _ => Err(Errno::EINVAL),
        }
    }

    pub fn listen(&self) -> Result<(), Errno> {
        let mut state = self.lock();
        let addr = match &*state {
            State::Fresh => SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
            State::Bound(addr) => *addr,
            State::Listening(_) => return Ok(()),
            State::Connected(_) => return Err(Errno::EISCONN),
        };
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        debug!("listening on {}", listener.local_addr()?);
        *state = State::Listening(listener);
        Ok(())
    }

    /// Port actually bound, once listening or connected.
    pub fn local_addr(&self) -> Result<SocketAddr, Errno> {
        match &*self.lock() {
            State::Listening(listener) => Ok(listener.local_addr()?),
            State::Connected(stream) => Ok(stream.local_addr()?),
            State::Bound(addr) => Ok(SocketAddr::V4(*addr)),
            State::Fresh => Err(Errno::EINVAL),
        }
    }

    fn poll_accept(&self) -> Result<Option<(TcpStream, SocketAddr)>, Errno> {
        if let Some(conn) = self
            .backlog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            return Ok(Some(conn));
        }
        match &*self.lock() {
            State::Listening(listener) => match listener.accept() {
                Ok(conn) => Ok(Some(conn)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
                Err(e) => Err(e.into()),
            },
            _ => Err(Errno::EINVAL),
        }
    }

    /// Wait for a connection. The new socket comes back with the peer.
    pub fn accept(&self, nonblocking: bool, signals: &Signals) -> Result<(Socket, SocketAddr), Errno> {
        loop {
            if let Some((stream, peer)) = self.poll_accept()? {
                debug!("accepted {}", peer);
                return Ok((Socket::connected(stream)?, peer));
            }
            if nonblocking {
                return Err(Errno::EAGAIN);
            }
            signals.pause()?;
        }
    }

    pub fn connect(&self, addr: SocketAddrV4) -> Result<(), Errno> {
        let mut state = self.lock();
        match &*state {
            State::Connected(_) => return Err(Errno::EISCONN),
            State::Listening(_) => return Err(Errno::EINVAL),
            State::Fresh | State::Bound(_) => {}
        }
        let stream = TcpStream::connect(addr)?;
        stream.set_nonblocking(true)?;
        *state = State::Connected(stream);
        Ok(())
    }

    pub fn read(&self, buf: &mut [u8], nonblocking: bool, signals: &Signals) -> Result<usize, Errno> {
        loop {
            match &*self.lock() {
                State::Connected(stream) => {
                    let mut stream: &TcpStream = stream;
                    match stream.read(buf) {
                        Ok(n) => return Ok(n),
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                _ => return Err(Errno::ENOTCONN),
            }
            if nonblocking {
                return Err(Errno::EAGAIN);
            }
            signals.pause()?;
        }
    }

    pub fn write(&self, data: &[u8], nonblocking: bool, signals: &Signals) -> Result<usize, Errno> {
        loop {
            match &*self.lock() {
                State::Connected(stream) => {
                    let mut stream: &TcpStream = stream;
                    match stream.write(data) {
                        Ok(n) => return Ok(n),
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                _ => return Err(Errno::ENOTCONN),
            }
            if nonblocking {
                return Err(Errno::EAGAIN);
            }
            signals.pause()?;
        }
    }

    pub fn readable(&self) -> bool {
        let listening = matches!(&*self.lock(), State::Listening(_));
        if listening {
            return match self.poll_accept() {
                Ok(Some(conn)) => {
                    self.backlog
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push_back(conn);
                    true
                }
                Ok(None) => false,
                Err(_) => true,
            };
        }
        match &*self.lock() {
            State::Connected(stream) => {
                let mut probe = [0u8; 1];
                !matches!(stream.peek(&mut probe), Err(e) if e.kind() == io::ErrorKind::WouldBlock)
            }
            _ => false,
        }
    }

    pub fn writable(&self) -> bool {
        matches!(&*self.lock(), State::Connected(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalState;
    use std::thread;

    #[test]
    fn loopback_accept_and_echo() {
        let signals = Signals::new(SignalState::new());
        let server = Socket::new();
        server.bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).unwrap();
        server.listen().unwrap();
        let port = server.local_addr().unwrap().port();
        assert!(!server.readable());

        let t = thread::spawn(move || {
            let client = Socket::new();
            let signals = Signals::new(SignalState::new());
            client.connect(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)).unwrap();
            client.write(b"ping", false, &signals).unwrap();
        });

        let (conn, _) = server.accept(false, &signals).unwrap();
        let mut buf = [0u8; 4];
        let mut got = 0;
        while got < 4 {
            got += conn.read(&mut buf[got..], false, &signals).unwrap();
        }
        assert_eq!(&buf, b"ping");
        t.join().unwrap();
    }

    #[test]
    fn unconnected_socket_cannot_read() {
        let signals = Signals::new(SignalState::new());
        let socket = Socket::new();
        assert_eq!(socket.read(&mut [0u8; 1], false, &signals), Err(Errno::ENOTCONN));
        assert_eq!(socket.accept(true, &signals).err(), Some(Errno::EINVAL));
    }
}
